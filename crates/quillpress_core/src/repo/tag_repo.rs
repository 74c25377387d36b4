//! Tag persistence on top of the generic flat repository.

use super::entity_repo::{id_list, parse_uuid, SqlEntity, SqliteRepository};
use super::{EntityRepository, RepoError, RepoResult};
use crate::model::{CreateTag, Entity, EntityId, Tag, TrashFilter};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub type TagRepository<'conn> = SqliteRepository<'conn, Tag>;

impl SqlEntity for Tag {
    const TABLE: &'static str = "content_tags";
    const COLUMNS: &'static str = "t.id AS id,
        t.name AS name,
        t.description AS description,
        (SELECT COUNT(*)
           FROM content_posts_tags pt
           JOIN content_posts p ON p.id = pt.post_id
          WHERE pt.tag_id = t.id
            AND p.deleted_at IS NULL) AS post_count,
        t.deleted_at AS deleted_at";
    const ORDER_BY: &'static str = "t.rowid ASC";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id: String = row.get("id")?;
        Ok(Self {
            id: parse_uuid(&id, "content_tags.id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            post_count: row.get("post_count")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

impl SqliteRepository<'_, Tag> {
    pub fn insert(&self, input: &CreateTag) -> RepoResult<Tag> {
        let id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO content_tags (id, name, description) VALUES (?1, ?2, ?3);",
            params![id.to_string(), input.name.trim(), input.description.as_deref()],
        )?;
        self.find_one(id, TrashFilter::ALL)?
            .ok_or(RepoError::NotFound { entity: Tag::LABEL, id })
    }

    /// Updates columns; `description: Some(None)` clears it.
    pub fn update_fields(
        &self,
        id: EntityId,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE content_tags
             SET name = COALESCE(?2, name),
                 description = CASE WHEN ?3 THEN ?4 ELSE description END
             WHERE id = ?1;",
            params![
                id.to_string(),
                name.map(str::trim),
                description.is_some(),
                description.flatten(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: Tag::LABEL, id });
        }
        Ok(())
    }

    /// Case-insensitive name check over live and trashed rows.
    pub fn name_exists(&self, name: &str, exclude: Option<EntityId>) -> RepoResult<bool> {
        let exists: i64 = self.conn().query_row(
            "SELECT EXISTS(
                SELECT 1 FROM content_tags
                WHERE name = ?1 COLLATE NOCASE
                  AND (?2 IS NULL OR id <> ?2)
            );",
            params![name.trim(), exclude.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }
}

/// Live tags linked to each of `post_ids`, ordered by name.
pub(crate) fn tags_for_posts(
    conn: &Connection,
    post_ids: &[EntityId],
) -> RepoResult<HashMap<EntityId, Vec<Tag>>> {
    let mut grouped: HashMap<EntityId, Vec<Tag>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(grouped);
    }

    let (placeholders, binds) = id_list(post_ids);
    let sql = format!(
        "SELECT pt.post_id AS post_id, {}
         FROM content_posts_tags pt
         JOIN content_tags t ON t.id = pt.tag_id
         WHERE pt.post_id IN ({placeholders})
           AND t.deleted_at IS NULL
         ORDER BY t.name COLLATE NOCASE ASC, t.rowid ASC;",
        Tag::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    while let Some(row) = rows.next()? {
        let post_id: String = row.get("post_id")?;
        let post_id = parse_uuid(&post_id, "content_posts_tags.post_id")?;
        grouped.entry(post_id).or_default().push(Tag::from_row(row)?);
    }
    Ok(grouped)
}

/// Replaces the tag links of one post.
pub(crate) fn replace_post_tags(conn: &Connection, post_id: EntityId, tag_ids: &[EntityId]) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM content_posts_tags WHERE post_id = ?1;",
        [post_id.to_string()],
    )?;
    for tag_id in tag_ids {
        conn.execute(
            "INSERT OR IGNORE INTO content_posts_tags (post_id, tag_id) VALUES (?1, ?2);",
            params![post_id.to_string(), tag_id.to_string()],
        )?;
    }
    Ok(())
}
