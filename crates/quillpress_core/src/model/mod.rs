//! Content domain model.
//!
//! # Responsibility
//! - Define the entities persisted by the content store.
//! - Define the tree shapes shared by categories and comments.
//! - Validate write inputs before they reach a repository.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID v4 `EntityId`.
//! - Soft deletion is a `deleted_at` timestamp, reversible by restore.

pub mod category;
pub mod comment;
pub mod entity;
pub mod post;
pub mod tag;
pub mod tree;
pub mod validation;
pub mod view;

pub use category::{Category, CreateCategory, UpdateCategory};
pub use comment::{Comment, CreateComment, UpdateComment};
pub use entity::{Entity, EntityId, SelectTrashMode, Timestamp, TrashFilter, TreeEntity};
pub use post::{CreatePost, Post, PostOrderType, UpdatePost};
pub use tag::{CreateTag, Tag, UpdateTag};
pub use tree::{build_trees, to_flat_trees, to_flat_trees_from, FlatNode, ParentChange, Tree};
pub use validation::{FieldViolation, ValidationError, ValidationResult, Validator};
pub use view::{CategoryView, CommentView};
