//! Document index for post search.
//!
//! # Responsibility
//! - Define the document-index contract consumed by content services.
//! - Provide the SQLite FTS5 implementation of that contract.
//!
//! # Invariants
//! - Documents are scoped by index name; two indexes never share hits.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fts;
pub mod index;

pub use fts::SqliteDocumentIndex;
pub use index::{
    DocumentComment, DocumentFilter, DocumentIndex, DocumentRef, PostDocument, SearchHits,
    SearchParams, SortField,
};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and document decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search document: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
