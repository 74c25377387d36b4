//! Tag model.

use super::entity::{Entity, EntityId, Timestamp};
use super::validation::{ValidationResult, Validator};
use serde::{Deserialize, Serialize};

pub const TAG_NAME_MAX_CHARS: usize = 255;
pub const TAG_DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: EntityId,
    /// Unique, compared case-insensitively.
    pub name: String,
    pub description: Option<String>,
    /// Live posts linked to this tag.
    pub post_count: i64,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for Tag {
    const LABEL: &'static str = "tag";

    fn id(&self) -> EntityId {
        self.id
    }

    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTag {
    pub name: String,
    pub description: Option<String>,
}

impl CreateTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut validator = Validator::new();
        validator
            .not_blank("name", &self.name)
            .max_chars("name", &self.name, TAG_NAME_MAX_CHARS);
        if let Some(description) = &self.description {
            validator.max_chars("description", description, TAG_DESCRIPTION_MAX_CHARS);
        }
        validator.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTag {
    pub id: EntityId,
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl UpdateTag {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            description: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut validator = Validator::new();
        if let Some(name) = &self.name {
            validator
                .not_blank("name", name)
                .max_chars("name", name, TAG_NAME_MAX_CHARS);
        }
        if let Some(Some(description)) = &self.description {
            validator.max_chars("description", description, TAG_DESCRIPTION_MAX_CHARS);
        }
        validator.finish()
    }
}
