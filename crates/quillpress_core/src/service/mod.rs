//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Share one list/paginate/detail/delete/restore surface between flat and
//!   tree-shaped content.
//! - Translate repository failures into per-request service errors.
//!
//! # Invariants
//! - Inputs are validated before any repository write.
//! - Tree children are reattached before their parent is removed.

use crate::model::{EntityId, ValidationError};
use crate::repo::RepoError;
use crate::search::SearchError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod base_service;
pub mod category_service;
pub mod comment_service;
pub mod pagination;
pub mod post_service;
pub mod search_service;
pub mod tag_service;

pub use base_service::{
    BaseService, Backend, DataService, FlatBackend, NodeFilter, QueryOptions, RepositoryKind,
    TreeBackend,
};
pub use category_service::CategoryService;
pub use comment_service::CommentService;
pub use pagination::{tree_paginate, PaginateOptions, Pagination, PaginationMeta};
pub use post_service::{PostListOptions, PostService, PostServiceOptions};
pub use search_service::{SearchOptions, SearchService};
pub use tag_service::TagService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from content service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Target row does not exist (or is trashed where live rows are required).
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// Referenced parent row does not exist.
    ParentNotFound {
        entity: &'static str,
        id: EntityId,
    },
    Validation(ValidationError),
    Conflict(String),
    /// Restore requested on a service without trash support.
    TrashDisabled {
        entity: &'static str,
    },
    /// Operation is not implemented by this service.
    OperationNotSupported {
        operation: &'static str,
        entity: &'static str,
    },
    Repo(RepoError),
    Search(SearchError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} {id} not exist"),
            Self::ParentNotFound { entity, id } => write!(f, "parent {entity} {id} not exist"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::TrashDisabled { entity } => {
                write!(f, "can not restore {entity}: trash not enabled")
            }
            Self::OperationNotSupported { operation, entity } => {
                write!(f, "can not {operation} {entity}")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::InvalidMove { id, parent } => Self::Conflict(format!(
                "can not move {id} below its own descendant {parent}"
            )),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SearchError> for ServiceError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}
