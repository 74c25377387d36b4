//! Post use-case service.
//!
//! # Responsibility
//! - Validate post input and derive missing summaries from the body.
//! - Build filtered, ordered post pages (publish state, category subtree,
//!   tag, keyword search).
//! - Keep the document index in step with post writes when
//!   `content.search_type` is `index`.
//!
//! # Invariants
//! - Referenced category and tags exist and are live.
//! - Index upkeep runs only after the row write committed.

use super::base_service::{BaseService, DataService, FlatBackend, QueryOptions};
use super::pagination::{PaginateOptions, Pagination};
use super::search_service::{SearchOptions, SearchService};
use super::{ServiceError, ServiceResult};
use crate::config::factories::{ContentConfig, SearchType, DEFAULT_SEARCH_INDEX};
use crate::model::post::{derive_summary, DERIVED_SUMMARY_CHARS};
use crate::model::{
    Category, CreatePost, Entity, EntityId, Post, PostOrderType, SelectTrashMode, Tag,
    TrashFilter, UpdatePost,
};
use crate::repo::{
    CategoryRepository, EntityRepository, NewPost, PostChanges, PostRepository, SqlFilter,
    TagRepository, TreeRepository,
};
use crate::search::SqliteDocumentIndex;
use log::info;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostServiceOptions {
    pub content: ContentConfig,
    /// Document index used when `content.search_type` is `index`.
    pub index: String,
}

impl Default for PostServiceOptions {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            index: DEFAULT_SEARCH_INDEX.to_string(),
        }
    }
}

/// Filters of a post page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostListOptions {
    pub trashed: SelectTrashMode,
    pub is_published: Option<bool>,
    /// `None` uses the default published, created, updated ordering.
    pub order_by: Option<PostOrderType>,
    /// Matches the category and every category below it.
    pub category: Option<EntityId>,
    pub tag: Option<EntityId>,
    pub search: Option<String>,
}

pub struct PostService<'conn> {
    base: BaseService<FlatBackend<Post, PostRepository<'conn>>>,
    categories: CategoryRepository<'conn>,
    tags: TagRepository<'conn>,
    search: Option<SearchService<'conn, SqliteDocumentIndex<'conn>>>,
    search_type: SearchType,
}

impl<'conn> PostService<'conn> {
    pub fn new(conn: &'conn Connection, options: PostServiceOptions) -> Self {
        let search_type = options.content.search_type;
        let search = match search_type {
            SearchType::Index => Some(SearchService::new(
                conn,
                SqliteDocumentIndex::new(conn, options.index),
            )),
            SearchType::Like => None,
        };
        Self {
            base: BaseService::new(FlatBackend::new(PostRepository::new(conn)), true),
            categories: CategoryRepository::new(conn),
            tags: TagRepository::new(conn),
            search,
            search_type,
        }
    }

    fn repo(&self) -> &PostRepository<'conn> {
        self.base.backend().repo()
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn search_service(&self) -> Option<&SearchService<'conn, SqliteDocumentIndex<'conn>>> {
        self.search.as_ref()
    }

    /// One page of posts matching `options`.
    pub fn paginate_posts(
        &self,
        options: &PostListOptions,
        page: PaginateOptions,
    ) -> ServiceResult<Pagination<Post>> {
        let text = options
            .search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());
        if let (Some(text), Some(search)) = (text, &self.search) {
            return self.paginate_from_index(search, text, options, page);
        }

        let filter = self.build_filter(options, text)?;
        self.paginate(&QueryOptions::new(options.trashed).with_scope(filter), page)
    }

    fn paginate_from_index(
        &self,
        search: &SearchService<'conn, SqliteDocumentIndex<'conn>>,
        text: &str,
        options: &PostListOptions,
        page: PaginateOptions,
    ) -> ServiceResult<Pagination<Post>> {
        let found = search.search(
            text,
            &SearchOptions {
                trashed: options.trashed,
                is_published: options.is_published,
                page: i64::from(page.page),
                limit: i64::from(page.limit),
            },
        )?;
        let ids: Vec<EntityId> = found.items.iter().map(|document| document.id).collect();
        let mut posts: HashMap<EntityId, Post> = self
            .repo()
            .find_by_ids(&ids, true)?
            .into_iter()
            .map(|post| (post.id, post))
            .collect();

        let items: Vec<Post> = ids.iter().filter_map(|id| posts.remove(id)).collect();
        let mut meta = found.meta;
        meta.item_count = items.len();
        Ok(Pagination { items, meta })
    }

    fn build_filter(&self, options: &PostListOptions, like: Option<&str>) -> ServiceResult<SqlFilter> {
        let mut filter = SqlFilter::new();
        match options.is_published {
            Some(true) => filter = filter.condition("t.published_at IS NOT NULL", Vec::new()),
            Some(false) => filter = filter.condition("t.published_at IS NULL", Vec::new()),
            None => {}
        }

        if let Some(category_id) = options.category {
            let ids = self.category_subtree(category_id)?;
            let placeholders = vec!["?"; ids.len()].join(", ");
            filter = filter.condition(
                format!("t.category_id IN ({placeholders})"),
                ids.into_iter().map(|id| Value::Text(id.to_string())),
            );
        }

        if let Some(tag_id) = options.tag {
            filter = filter.condition(
                "EXISTS (SELECT 1 FROM content_posts_tags pt WHERE pt.post_id = t.id AND pt.tag_id = ?)",
                [Value::Text(tag_id.to_string())],
            );
        }

        if let Some(text) = like {
            let pattern = Value::Text(format!("%{}%", escape_like(text)));
            filter = filter.condition(
                "(t.title LIKE ? ESCAPE '\\' OR t.body LIKE ? ESCAPE '\\' \
                 OR t.summary LIKE ? ESCAPE '\\' OR t.keywords LIKE ? ESCAPE '\\')",
                vec![pattern; 4],
            );
        }

        if let Some(order) = options.order_by {
            filter = filter.order_by(order_clause(order));
        }
        Ok(filter)
    }

    /// `category_id` plus every live category below it.
    fn category_subtree(&self, category_id: EntityId) -> ServiceResult<Vec<EntityId>> {
        let category = self.live_category(category_id)?;
        let mut ids = vec![category.id];
        ids.extend(
            self.categories
                .find_descendants(&category, TrashFilter::LIVE)?
                .iter()
                .map(Entity::id),
        );
        Ok(ids)
    }

    fn live_category(&self, id: EntityId) -> ServiceResult<Category> {
        self.categories
            .find_one(id, TrashFilter::LIVE)?
            .ok_or(ServiceError::NotFound {
                entity: Category::LABEL,
                id,
            })
    }

    fn ensure_tags(&self, ids: &[EntityId]) -> ServiceResult<()> {
        let found = self.tags.find_by_ids(ids, false)?;
        match ids.iter().find(|id| !found.iter().any(|tag| tag.id == **id)) {
            Some(missing) => Err(ServiceError::NotFound {
                entity: Tag::LABEL,
                id: *missing,
            }),
            None => Ok(()),
        }
    }

    /// Refreshes the indexed documents of `ids`, e.g. after comments changed.
    pub fn reindex(&self, ids: &[EntityId]) -> ServiceResult<usize> {
        let Some(search) = &self.search else {
            return Ok(0);
        };
        let posts = self.repo().find_by_ids(ids, true)?;
        search.update(&posts)
    }
}

impl<'conn> DataService for PostService<'conn> {
    type Backend = FlatBackend<Post, PostRepository<'conn>>;
    type Create = CreatePost;
    type Update = UpdatePost;

    fn base(&self) -> &BaseService<Self::Backend> {
        &self.base
    }

    fn create(&self, input: CreatePost) -> ServiceResult<Post> {
        input.validate()?;
        if let Some(category) = input.category {
            self.live_category(category)?;
        }
        self.ensure_tags(&input.tags)?;

        let summary = match input.summary.as_deref().map(str::trim) {
            Some(summary) if !summary.is_empty() => summary.to_string(),
            _ => derive_summary(&input.body, DERIVED_SUMMARY_CHARS),
        };
        let post = self.repo().insert(&NewPost {
            title: input.title,
            body: input.body,
            summary,
            keywords: input.keywords,
            custom_order: input.custom_order,
            category_id: input.category,
            tag_ids: input.tags,
            publish: input.publish,
        })?;

        if let Some(search) = &self.search {
            search.create(&post)?;
        }
        info!(
            "event=post_create module=service status=ok published={} tags={}",
            post.is_published(),
            post.tags.len()
        );
        Ok(post)
    }

    fn update(&self, input: UpdatePost) -> ServiceResult<Post> {
        input.validate()?;
        let current = self.detail(input.id)?;
        if let Some(Some(category)) = input.category {
            self.live_category(category)?;
        }
        if let Some(tags) = &input.tags {
            self.ensure_tags(tags)?;
        }

        let summary = match &input.summary {
            Some(Some(summary)) if !summary.trim().is_empty() => Some(summary.trim().to_string()),
            Some(_) => Some(derive_summary(
                input.body.as_deref().unwrap_or(&current.body),
                DERIVED_SUMMARY_CHARS,
            )),
            None => None,
        };
        let post = self.repo().update(
            current.id,
            &PostChanges {
                title: input.title,
                body: input.body,
                summary,
                keywords: input.keywords,
                custom_order: input.custom_order,
                category_id: input.category,
                tag_ids: input.tags,
                publish: input.publish,
            },
        )?;

        if let Some(search) = &self.search {
            search.update(std::slice::from_ref(&post))?;
        }
        info!(
            "event=post_update module=service status=ok published={}",
            post.is_published()
        );
        Ok(post)
    }

    fn delete(&self, ids: &[EntityId], trash: bool) -> ServiceResult<Vec<Post>> {
        let removed = self.base.delete(ids, trash)?;
        if let Some(search) = &self.search {
            let removed_ids: Vec<EntityId> = removed.iter().map(Entity::id).collect();
            let trashed = self.repo().find_by_ids(&removed_ids, true)?;
            let gone: Vec<EntityId> = removed_ids
                .iter()
                .copied()
                .filter(|id| !trashed.iter().any(|post| post.id == *id))
                .collect();
            search.update(&trashed)?;
            search.delete(&gone)?;
        }
        Ok(removed)
    }

    fn restore(&self, ids: &[EntityId]) -> ServiceResult<Vec<Post>> {
        let restored = self.base.restore(ids)?;
        if let Some(search) = &self.search {
            search.update(&restored)?;
        }
        Ok(restored)
    }
}

fn order_clause(order: PostOrderType) -> &'static str {
    match order {
        PostOrderType::Created => "t.created_at DESC, t.rowid DESC",
        PostOrderType::Updated => "t.updated_at DESC, t.rowid DESC",
        PostOrderType::Published => "t.published_at DESC, t.rowid DESC",
        PostOrderType::CommentCount => "comment_count DESC, t.rowid DESC",
        PostOrderType::Custom => "t.custom_order DESC, t.rowid DESC",
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
    }
}
