//! Comment tree model. Every comment belongs to one post; a reply belongs to
//! the same post as its parent.

use super::entity::{Entity, EntityId, Timestamp, TreeEntity};
use super::validation::{ValidationResult, Validator};
use serde::{Deserialize, Serialize};

pub const COMMENT_BODY_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    pub body: String,
    pub post_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub mpath: String,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for Comment {
    const LABEL: &'static str = "comment";

    fn id(&self) -> EntityId {
        self.id
    }

    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }
}

impl TreeEntity for Comment {
    fn parent_id(&self) -> Option<EntityId> {
        self.parent_id
    }

    fn set_parent_id(&mut self, parent_id: Option<EntityId>) {
        self.parent_id = parent_id;
    }

    fn mpath(&self) -> &str {
        &self.mpath
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateComment {
    pub body: String,
    pub post_id: EntityId,
    pub parent: Option<EntityId>,
}

impl CreateComment {
    pub fn new(post_id: EntityId, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            post_id,
            parent: None,
        }
    }

    pub fn reply_to(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn validate(&self) -> ValidationResult {
        Validator::new()
            .not_blank("body", &self.body)
            .max_chars("body", &self.body, COMMENT_BODY_MAX_CHARS)
            .finish()
    }
}

/// Body edit of an existing comment. The comment service does not accept
/// edits; the shape exists so callers get a typed refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateComment {
    pub id: EntityId,
    pub body: String,
}

impl UpdateComment {
    pub fn new(id: EntityId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }
}
