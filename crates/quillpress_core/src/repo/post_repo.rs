//! Post persistence on top of the generic flat repository.
//!
//! # Invariants
//! - Row insert and tag links commit together.
//! - `comment_count` and `tags` only reflect live rows.

use super::entity_repo::{find_by_ids, parse_optional_uuid, parse_uuid, SqlEntity, SqliteRepository};
use super::tag_repo::{replace_post_tags, tags_for_posts};
use super::{EntityRepository, RepoError, RepoResult};
use crate::model::{Category, Entity, EntityId, Post, TrashFilter};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

pub type PostRepository<'conn> = SqliteRepository<'conn, Post>;

/// Fully resolved insert payload; the service derives the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub custom_order: i64,
    pub category_id: Option<EntityId>,
    pub tag_ids: Vec<EntityId>,
    pub publish: bool,
}

/// Column changes; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub body: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub custom_order: Option<i64>,
    pub category_id: Option<Option<EntityId>>,
    pub tag_ids: Option<Vec<EntityId>>,
    pub publish: Option<bool>,
}

impl SqlEntity for Post {
    const TABLE: &'static str = "content_posts";
    const COLUMNS: &'static str = "t.id AS id,
        t.title AS title,
        t.body AS body,
        t.summary AS summary,
        t.keywords AS keywords,
        t.custom_order AS custom_order,
        t.category_id AS category_id,
        (SELECT COUNT(*)
           FROM content_comments c
          WHERE c.post_id = t.id
            AND c.deleted_at IS NULL) AS comment_count,
        t.published_at AS published_at,
        t.created_at AS created_at,
        t.updated_at AS updated_at,
        t.deleted_at AS deleted_at";
    const ORDER_BY: &'static str =
        "t.published_at DESC, t.created_at DESC, t.updated_at DESC, comment_count DESC, t.rowid DESC";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id: String = row.get("id")?;
        let keywords: String = row.get("keywords")?;
        let keywords = serde_json::from_str::<Vec<String>>(&keywords).map_err(|err| {
            RepoError::InvalidData(format!("invalid keywords in content_posts.keywords: {err}"))
        })?;

        Ok(Self {
            id: parse_uuid(&id, "content_posts.id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            summary: row.get::<_, Option<String>>("summary")?.unwrap_or_default(),
            keywords,
            custom_order: row.get("custom_order")?,
            category_id: parse_optional_uuid(row.get("category_id")?, "content_posts.category_id")?,
            category: None,
            tags: Vec::new(),
            comment_count: row.get("comment_count")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }

    fn hydrate(conn: &Connection, items: &mut [Self]) -> RepoResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut category_ids: Vec<EntityId> = items.iter().filter_map(|post| post.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        let categories: HashMap<EntityId, Category> = find_by_ids::<Category>(conn, &category_ids, true)?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();

        let post_ids: Vec<EntityId> = items.iter().map(Entity::id).collect();
        let mut tags = tags_for_posts(conn, &post_ids)?;

        for post in items.iter_mut() {
            post.category = post.category_id.and_then(|id| categories.get(&id).cloned());
            post.tags = tags.remove(&post.id).unwrap_or_default();
        }
        Ok(())
    }
}

impl SqliteRepository<'_, Post> {
    pub fn insert(&self, input: &NewPost) -> RepoResult<Post> {
        let id = Uuid::new_v4();
        let keywords = encode_keywords(&input.keywords)?;

        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO content_posts (
                id, title, body, summary, keywords, custom_order, category_id, published_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                CASE WHEN ?8 THEN (strftime('%s', 'now') * 1000) ELSE NULL END
            );",
            params![
                id.to_string(),
                input.title.trim(),
                input.body.as_str(),
                input.summary.as_str(),
                keywords,
                input.custom_order,
                input.category_id.map(|value| value.to_string()),
                input.publish,
            ],
        )?;
        replace_post_tags(&tx, id, &input.tag_ids)?;
        tx.commit()?;

        self.find_one(id, TrashFilter::ALL)?
            .ok_or(RepoError::NotFound { entity: Post::LABEL, id })
    }

    pub fn update(&self, id: EntityId, changes: &PostChanges) -> RepoResult<Post> {
        let keywords = changes.keywords.as_deref().map(encode_keywords).transpose()?;

        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE content_posts
             SET title = COALESCE(?2, title),
                 body = COALESCE(?3, body),
                 summary = COALESCE(?4, summary),
                 keywords = COALESCE(?5, keywords),
                 custom_order = COALESCE(?6, custom_order),
                 category_id = CASE WHEN ?7 THEN ?8 ELSE category_id END,
                 published_at = CASE
                     WHEN ?9 IS NULL THEN published_at
                     WHEN ?9 THEN COALESCE(published_at, strftime('%s', 'now') * 1000)
                     ELSE NULL
                 END,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                changes.title.as_deref().map(str::trim),
                changes.body.as_deref(),
                changes.summary.as_deref(),
                keywords,
                changes.custom_order,
                changes.category_id.is_some(),
                changes.category_id.flatten().map(|value| value.to_string()),
                changes.publish,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: Post::LABEL, id });
        }
        if let Some(tag_ids) = &changes.tag_ids {
            replace_post_tags(&tx, id, tag_ids)?;
        }
        tx.commit()?;

        self.find_one(id, TrashFilter::ALL)?
            .ok_or(RepoError::NotFound { entity: Post::LABEL, id })
    }
}

fn encode_keywords(keywords: &[String]) -> RepoResult<String> {
    serde_json::to_string(keywords)
        .map_err(|err| RepoError::InvalidData(format!("unencodable keywords: {err}")))
}
