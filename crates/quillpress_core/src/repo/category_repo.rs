//! Category persistence on top of the generic tree repository.

use super::entity_repo::{parse_optional_uuid, parse_uuid, SqlEntity};
use super::tree_repo::{apply_move, SqliteTreeRepository};
use super::{EntityRepository, RepoError, RepoResult};
use crate::model::{Category, CreateCategory, Entity, EntityId, TrashFilter};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

pub type CategoryRepository<'conn> = SqliteTreeRepository<'conn, Category>;

impl SqlEntity for Category {
    const TABLE: &'static str = "content_categories";
    const COLUMNS: &'static str = "t.id AS id,
        t.name AS name,
        t.custom_order AS custom_order,
        t.parent_id AS parent_id,
        t.mpath AS mpath,
        t.deleted_at AS deleted_at";
    const ORDER_BY: &'static str = "t.custom_order ASC, t.rowid ASC";

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id: String = row.get("id")?;
        Ok(Self {
            id: parse_uuid(&id, "content_categories.id")?,
            name: row.get("name")?,
            custom_order: row.get("custom_order")?,
            parent_id: parse_optional_uuid(row.get("parent_id")?, "content_categories.parent_id")?,
            mpath: row.get("mpath")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

impl SqliteTreeRepository<'_, Category> {
    /// Inserts a validated category below `input.parent`.
    pub fn insert(&self, input: &CreateCategory) -> RepoResult<Category> {
        let id = Uuid::new_v4();
        let mpath = self.child_mpath(input.parent, id)?;
        self.conn().execute(
            "INSERT INTO content_categories (id, name, custom_order, parent_id, mpath)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                id.to_string(),
                input.name.trim(),
                input.custom_order,
                input.parent.map(|parent| parent.to_string()),
                mpath,
            ],
        )?;

        self.find_one(id, TrashFilter::ALL)?
            .ok_or(RepoError::NotFound { entity: Category::LABEL, id })
    }

    /// Updates scalar columns; `None` keeps the stored value.
    /// Renames, reorders and optionally moves a category in one transaction.
    ///
    /// `parent` is `None` to keep the current parent.
    pub fn update_fields(
        &self,
        id: EntityId,
        name: Option<&str>,
        custom_order: Option<i64>,
        parent: Option<Option<EntityId>>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn(), TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE content_categories
             SET name = COALESCE(?2, name),
                 custom_order = COALESCE(?3, custom_order)
             WHERE id = ?1;",
            params![id.to_string(), name.map(str::trim), custom_order],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: Category::LABEL, id });
        }
        if let Some(parent) = parent {
            apply_move::<Category>(&tx, id, parent)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Whether a live sibling below `parent` already uses `name`.
    pub fn sibling_name_exists(
        &self,
        parent: Option<EntityId>,
        name: &str,
        exclude: Option<EntityId>,
    ) -> RepoResult<bool> {
        let mut sql = String::from(
            "SELECT EXISTS(
                SELECT 1 FROM content_categories
                WHERE deleted_at IS NULL
                  AND name = ? COLLATE NOCASE",
        );
        let mut binds = vec![Value::Text(name.trim().to_string())];
        match parent {
            Some(parent) => {
                sql.push_str(" AND parent_id = ?");
                binds.push(Value::Text(parent.to_string()));
            }
            None => sql.push_str(" AND parent_id IS NULL"),
        }
        if let Some(exclude) = exclude {
            sql.push_str(" AND id <> ?");
            binds.push(Value::Text(exclude.to_string()));
        }
        sql.push_str(");");

        let exists: i64 = self
            .conn()
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(exists != 0)
    }
}
