//! Document-index contract and document shapes.

use super::SearchResult;
use crate::model::{EntityId, Timestamp, TrashFilter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentComment {
    pub id: EntityId,
    pub body: String,
}

/// Denormalized post snapshot stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocument {
    pub id: EntityId,
    pub title: String,
    pub body: String,
    pub summary: String,
    pub keywords: Vec<String>,
    /// Category chain from the root down to the post's own category.
    pub categories: Vec<DocumentRef>,
    pub tags: Vec<DocumentRef>,
    pub comments: Vec<DocumentComment>,
    pub comment_count: i64,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Full-text rank; ignored for blank queries.
    Relevance,
    UpdatedAtDesc,
    PublishedAtDesc,
    CommentCountDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentFilter {
    pub trash: TrashFilter,
    /// `Some(true)` keeps published posts, `Some(false)` keeps drafts.
    pub published: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// 1-based page.
    pub page: u32,
    pub limit: u32,
    pub sort: Vec<SortField>,
    pub filter: DocumentFilter,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort: vec![SortField::UpdatedAtDesc, SortField::CommentCountDesc],
            filter: DocumentFilter::default(),
        }
    }
}

/// One page of hits plus totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHits {
    pub hits: Vec<PostDocument>,
    pub page: u32,
    pub hits_per_page: u32,
    pub estimated_total_hits: u64,
    pub total_hits: u64,
}

pub trait DocumentIndex {
    /// Index name documents are scoped to.
    fn name(&self) -> &str;

    /// Inserts `documents`, replacing any with the same id.
    fn add_documents(&self, documents: &[PostDocument]) -> SearchResult<usize>;

    /// Refreshes `documents`; unknown ids are inserted.
    fn update_documents(&self, documents: &[PostDocument]) -> SearchResult<usize>;

    fn delete_documents(&self, ids: &[EntityId]) -> SearchResult<usize>;

    /// Blank `text` matches every document that passes the filter.
    fn search(&self, text: &str, params: &SearchParams) -> SearchResult<SearchHits>;
}
