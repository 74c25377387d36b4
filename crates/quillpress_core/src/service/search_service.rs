//! Post document building and index queries.
//!
//! # Responsibility
//! - Denormalize a post (category chain, tags, live comments) into one
//!   [`PostDocument`].
//! - Keep the document index in step with post writes.
//! - Answer keyword searches as paged results.

use super::pagination::{PaginateOptions, Pagination, PaginationMeta};
use super::ServiceResult;
use crate::model::{Category, EntityId, Post, SelectTrashMode, TrashFilter};
use crate::repo::{CategoryRepository, CommentRepository, TreeRepository};
use crate::search::{
    DocumentComment, DocumentFilter, DocumentIndex, DocumentRef, PostDocument, SearchParams,
};
use log::debug;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub trashed: SelectTrashMode,
    /// `Some(true)` keeps published posts, `Some(false)` keeps drafts.
    pub is_published: Option<bool>,
    pub page: i64,
    pub limit: i64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            trashed: SelectTrashMode::None,
            is_published: None,
            page: 1,
            limit: 10,
        }
    }
}

pub struct SearchService<'conn, I> {
    index: I,
    categories: CategoryRepository<'conn>,
    comments: CommentRepository<'conn>,
}

impl<'conn, I: DocumentIndex> SearchService<'conn, I> {
    pub fn new(conn: &'conn Connection, index: I) -> Self {
        Self {
            index,
            categories: CategoryRepository::new(conn),
            comments: CommentRepository::new(conn),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Snapshot of `post` as stored in the index.
    pub fn build_document(&self, post: &Post) -> ServiceResult<PostDocument> {
        let categories = match &post.category {
            Some(category) => self.category_chain(category)?,
            None => Vec::new(),
        };
        let comments = self
            .comments
            .find_by_post(post.id)?
            .into_iter()
            .map(|comment| DocumentComment {
                id: comment.id,
                body: comment.body,
            })
            .collect();

        Ok(PostDocument {
            id: post.id,
            title: post.title.clone(),
            body: post.body.clone(),
            summary: post.summary.clone(),
            keywords: post.keywords.clone(),
            categories,
            tags: post
                .tags
                .iter()
                .map(|tag| DocumentRef {
                    id: tag.id,
                    name: tag.name.clone(),
                })
                .collect(),
            comments,
            comment_count: post.comment_count,
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
            deleted_at: post.deleted_at,
        })
    }

    /// Ancestors from the root down, then `category` itself.
    fn category_chain(&self, category: &Category) -> ServiceResult<Vec<DocumentRef>> {
        let mut ancestors = self.categories.find_ancestors(category, TrashFilter::ALL)?;
        ancestors.sort_by_key(|item| item.mpath.len());
        ancestors.push(category.clone());
        Ok(ancestors
            .into_iter()
            .map(|item| DocumentRef {
                id: item.id,
                name: item.name,
            })
            .collect())
    }

    pub fn create(&self, post: &Post) -> ServiceResult<usize> {
        let document = self.build_document(post)?;
        Ok(self.index.add_documents(&[document])?)
    }

    pub fn update(&self, posts: &[Post]) -> ServiceResult<usize> {
        let documents = posts
            .iter()
            .map(|post| self.build_document(post))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(self.index.update_documents(&documents)?)
    }

    pub fn delete(&self, ids: &[EntityId]) -> ServiceResult<usize> {
        Ok(self.index.delete_documents(ids)?)
    }

    pub fn search(&self, text: &str, options: &SearchOptions) -> ServiceResult<Pagination<PostDocument>> {
        let page = PaginateOptions::new(options.page, options.limit);
        let params = SearchParams {
            page: page.page,
            limit: page.limit,
            filter: DocumentFilter {
                trash: TrashFilter::from_mode(options.trashed, true),
                published: options.is_published,
            },
            ..SearchParams::default()
        };
        let result = self.index.search(text, &params)?;

        debug!(
            "event=content_search module=service status=ok index={} hits={} total={}",
            self.index.name(),
            result.hits.len(),
            result.estimated_total_hits
        );
        Ok(Pagination {
            meta: PaginationMeta {
                item_count: result.hits.len(),
                total_items: result.estimated_total_hits,
                per_page: result.hits_per_page,
                total_pages: result
                    .estimated_total_hits
                    .div_ceil(u64::from(result.hits_per_page.max(1))),
                current_page: result.page,
            },
            items: result.hits,
        })
    }
}
