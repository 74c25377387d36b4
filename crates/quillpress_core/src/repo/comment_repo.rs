//! Comment persistence on top of the generic tree repository.

use super::entity_repo::{id_value, parse_optional_uuid, parse_uuid, select, SqlEntity};
use super::tree_repo::SqliteTreeRepository;
use super::{EntityRepository, RepoError, RepoResult};
use crate::model::{Comment, CreateComment, Entity, EntityId, TrashFilter};
use rusqlite::{params, Row};
use uuid::Uuid;

pub type CommentRepository<'conn> = SqliteTreeRepository<'conn, Comment>;

impl SqlEntity for Comment {
    const TABLE: &'static str = "content_comments";
    const COLUMNS: &'static str = "t.id AS id,
        t.body AS body,
        t.post_id AS post_id,
        t.parent_id AS parent_id,
        t.mpath AS mpath,
        t.created_at AS created_at,
        t.deleted_at AS deleted_at";
    const ORDER_BY: &'static str = "t.created_at ASC, t.rowid ASC";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id: String = row.get("id")?;
        let post_id: String = row.get("post_id")?;
        Ok(Self {
            id: parse_uuid(&id, "content_comments.id")?,
            body: row.get("body")?,
            post_id: parse_uuid(&post_id, "content_comments.post_id")?,
            parent_id: parse_optional_uuid(row.get("parent_id")?, "content_comments.parent_id")?,
            mpath: row.get("mpath")?,
            created_at: row.get("created_at")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

impl SqliteTreeRepository<'_, Comment> {
    /// Inserts a validated comment; the caller checks post and parent.
    pub fn insert(&self, input: &CreateComment) -> RepoResult<Comment> {
        let id = Uuid::new_v4();
        let mpath = self.child_mpath(input.parent, id)?;
        self.conn().execute(
            "INSERT INTO content_comments (id, body, post_id, parent_id, mpath)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                input.body.as_str(),
                input.post_id.to_string(),
                input.parent.map(|parent| parent.to_string()),
                mpath,
            ],
        )?;

        self.find_one(id, TrashFilter::ALL)?
            .ok_or(RepoError::NotFound { entity: Comment::LABEL, id })
    }

    /// Live comments of one post in default order.
    pub fn find_by_post(&self, post_id: EntityId) -> RepoResult<Vec<Comment>> {
        select(
            self.conn(),
            &format!(
                "WHERE t.post_id = ? AND t.deleted_at IS NULL ORDER BY {}",
                Comment::ORDER_BY
            ),
            vec![id_value(post_id)],
        )
    }
}
