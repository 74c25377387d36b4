//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define generic entity, flat and tree data access contracts.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Multi-statement tree writes run inside one immediate transaction.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidMove`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use crate::model::EntityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod category_repo;
pub mod comment_repo;
pub mod entity_repo;
pub mod post_repo;
pub mod tag_repo;
pub mod tree_repo;

pub use category_repo::CategoryRepository;
pub use comment_repo::CommentRepository;
pub use entity_repo::{
    EntityRepository, FlatRepository, ListQuery, SqlEntity, SqlFilter, SqliteRepository,
};
pub use post_repo::{NewPost, PostChanges, PostRepository};
pub use tag_repo::TagRepository;
pub use tree_repo::{FindTreesOptions, ParentMove, SqliteTreeRepository, TreeRepository};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// Moving `id` below `parent` would create a cycle.
    InvalidMove {
        id: EntityId,
        parent: EntityId,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidMove { id, parent } => {
                write!(f, "cannot move {id} below its own descendant {parent}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidMove { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
