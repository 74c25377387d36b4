//! Category tree model.
//!
//! # Invariants
//! - `mpath` ends with `"{id}."` and starts with the parent's `mpath`.
//! - Siblings are ordered by `custom_order`, then insertion order.

use super::entity::{Entity, EntityId, Timestamp, TreeEntity};
use super::tree::ParentChange;
use super::validation::{ValidationResult, Validator};
use serde::{Deserialize, Serialize};

pub const CATEGORY_NAME_MAX_CHARS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    pub custom_order: i64,
    pub parent_id: Option<EntityId>,
    pub mpath: String,
    pub deleted_at: Option<Timestamp>,
}

impl Entity for Category {
    const LABEL: &'static str = "category";

    fn id(&self) -> EntityId {
        self.id
    }

    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }
}

impl TreeEntity for Category {
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
pub struct CreateCategory {
    pub name: String,
    pub parent: Option<EntityId>,
    pub custom_order: i64,
}

impl CreateCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            custom_order: 0,
        }
    }

    pub fn under(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn ordered(mut self, custom_order: i64) -> Self {
        self.custom_order = custom_order;
        self
    }

    pub fn validate(&self) -> ValidationResult {
        Validator::new()
            .not_blank("name", &self.name)
            .max_chars("name", &self.name, CATEGORY_NAME_MAX_CHARS)
            .min_value("custom_order", self.custom_order, 0)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCategory {
    pub id: EntityId,
    pub name: Option<String>,
    pub custom_order: Option<i64>,
    pub parent: ParentChange,
}

impl UpdateCategory {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            custom_order: None,
            parent: ParentChange::Keep,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut validator = Validator::new();
        if let Some(name) = &self.name {
            validator
                .not_blank("name", name)
                .max_chars("name", name, CATEGORY_NAME_MAX_CHARS);
        }
        if let Some(custom_order) = self.custom_order {
            validator.min_value("custom_order", custom_order, 0);
        }
        validator.finish()
    }
}
