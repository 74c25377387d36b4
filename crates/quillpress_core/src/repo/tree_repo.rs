//! Generic materialized-path tree repository.
//!
//! # Responsibility
//! - Query roots, children, descendants and ancestors of any tree entity.
//! - Build the full forest and flatten it for pagination.
//! - Move nodes and whole subtrees by rewriting `parent_id` and `mpath`.
//!
//! # Invariants
//! - `mpath` of a node is its parent's `mpath` followed by `"{id}."`.
//! - A node never moves below one of its own descendants.
//! - Parent changes that belong together commit in one transaction.

use super::entity_repo::{
    count, delete_by_ids, find_by_ids, find_one, id_value, ids_of, restore_by_ids, select,
    soft_remove, where_sql, EntityRepository, SqlEntity,
};
use super::{RepoError, RepoResult};
use crate::model::{build_trees, to_flat_trees, EntityId, FlatNode, TrashFilter, Tree, TreeEntity};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::marker::PhantomData;

/// Filters for [`TreeRepository::find_trees`].
pub struct FindTreesOptions<'a, E> {
    pub trash: TrashFilter,
    /// Applied at every level; a rejected node drops its subtree.
    pub filter: Option<&'a dyn Fn(&E) -> bool>,
}

impl<E> Default for FindTreesOptions<'_, E> {
    fn default() -> Self {
        Self {
            trash: TrashFilter::LIVE,
            filter: None,
        }
    }
}

impl<E> Clone for FindTreesOptions<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FindTreesOptions<'_, E> {}

impl<'a, E> FindTreesOptions<'a, E> {
    pub fn new(trash: TrashFilter) -> Self {
        Self { trash, filter: None }
    }

    pub fn with_filter(mut self, filter: &'a dyn Fn(&E) -> bool) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// One parent change: `node` moves below `parent` (`None` is the root level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentMove {
    pub node: EntityId,
    pub parent: Option<EntityId>,
}

pub trait TreeRepository<E: TreeEntity>: EntityRepository<E> {
    fn find_roots(&self, trash: TrashFilter) -> RepoResult<Vec<E>>;

    fn find_children(&self, id: EntityId, with_trashed: bool) -> RepoResult<Vec<E>>;

    /// Transitive descendants of `entity`, excluding itself.
    fn find_descendants(&self, entity: &E, trash: TrashFilter) -> RepoResult<Vec<E>>;

    /// Transitive ancestors of `entity`, excluding itself.
    fn find_ancestors(&self, entity: &E, trash: TrashFilter) -> RepoResult<Vec<E>>;

    fn count_descendants(&self, entity: &E, trash: TrashFilter) -> RepoResult<u64>;

    fn count_ancestors(&self, entity: &E, trash: TrashFilter) -> RepoResult<u64>;

    fn find_trees(&self, options: FindTreesOptions<'_, E>) -> RepoResult<Vec<Tree<E>>>;

    /// Moves `id` and its whole subtree below `parent`.
    fn move_to_parent(&self, id: EntityId, parent: Option<EntityId>) -> RepoResult<()>;

    /// Applies every move in one transaction and returns how many were applied.
    fn reattach_children(&self, moves: &[ParentMove]) -> RepoResult<usize>;

    fn to_flat_trees(&self, trees: Vec<Tree<E>>) -> Vec<FlatNode<E>> {
        to_flat_trees(trees)
    }
}

/// SQLite tree repository for any entity with a `parent_id` and `mpath`.
pub struct SqliteTreeRepository<'conn, E> {
    conn: &'conn Connection,
    _entity: PhantomData<E>,
}

impl<'conn, E: SqlEntity + TreeEntity> SqliteTreeRepository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }

    /// `mpath` a new node `id` gets below `parent`.
    pub(crate) fn child_mpath(&self, parent: Option<EntityId>, id: EntityId) -> RepoResult<String> {
        let prefix = match parent {
            None => String::new(),
            Some(parent) => stored_mpath::<E>(self.conn, parent)?
                .ok_or(RepoError::NotFound { entity: E::LABEL, id: parent })?,
        };
        Ok(format!("{prefix}{id}."))
    }

    fn select_tree(&self, conditions: Vec<String>, binds: Vec<Value>, trash: TrashFilter) -> RepoResult<Vec<E>> {
        let mut conditions = conditions;
        conditions.extend(trash.sql("t.deleted_at"));
        select(
            self.conn,
            &format!("{} ORDER BY {}", where_sql(&conditions), E::ORDER_BY),
            binds,
        )
    }
}

impl<E: SqlEntity + TreeEntity> EntityRepository<E> for SqliteTreeRepository<'_, E> {
    fn find_one(&self, id: EntityId, trash: TrashFilter) -> RepoResult<Option<E>> {
        find_one(self.conn, id, trash)
    }

    fn find_by_ids(&self, ids: &[EntityId], with_trashed: bool) -> RepoResult<Vec<E>> {
        find_by_ids(self.conn, ids, with_trashed)
    }

    fn remove(&self, items: &[E]) -> RepoResult<usize> {
        delete_by_ids::<E>(self.conn, &ids_of(items))
    }

    fn soft_remove(&self, items: &[E]) -> RepoResult<Vec<E>> {
        soft_remove(self.conn, items)
    }

    fn restore(&self, ids: &[EntityId]) -> RepoResult<usize> {
        restore_by_ids::<E>(self.conn, ids)
    }
}

impl<E: SqlEntity + TreeEntity> TreeRepository<E> for SqliteTreeRepository<'_, E> {
    fn find_roots(&self, trash: TrashFilter) -> RepoResult<Vec<E>> {
        self.select_tree(vec!["t.parent_id IS NULL".to_string()], Vec::new(), trash)
    }

    fn find_children(&self, id: EntityId, with_trashed: bool) -> RepoResult<Vec<E>> {
        self.select_tree(
            vec!["t.parent_id = ?".to_string()],
            vec![id_value(id)],
            TrashFilter::new(with_trashed, false),
        )
    }

    fn find_descendants(&self, entity: &E, trash: TrashFilter) -> RepoResult<Vec<E>> {
        let (conditions, binds) = descendant_scope(entity);
        self.select_tree(conditions, binds, trash)
    }

    fn find_ancestors(&self, entity: &E, trash: TrashFilter) -> RepoResult<Vec<E>> {
        let (conditions, binds) = ancestor_scope(entity);
        self.select_tree(conditions, binds, trash)
    }

    fn count_descendants(&self, entity: &E, trash: TrashFilter) -> RepoResult<u64> {
        let (mut conditions, binds) = descendant_scope(entity);
        conditions.extend(trash.sql("t.deleted_at"));
        count::<E>(self.conn, &where_sql(&conditions), binds)
    }

    fn count_ancestors(&self, entity: &E, trash: TrashFilter) -> RepoResult<u64> {
        let (mut conditions, binds) = ancestor_scope(entity);
        conditions.extend(trash.sql("t.deleted_at"));
        count::<E>(self.conn, &where_sql(&conditions), binds)
    }

    fn find_trees(&self, options: FindTreesOptions<'_, E>) -> RepoResult<Vec<Tree<E>>> {
        let rows = self.select_tree(Vec::new(), Vec::new(), options.trash)?;
        Ok(build_trees(rows, options.filter))
    }

    fn move_to_parent(&self, id: EntityId, parent: Option<EntityId>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        apply_move::<E>(&tx, id, parent)?;
        tx.commit()?;

        info!(
            "event=tree_move module=repo status=ok entity={} has_parent={}",
            E::LABEL,
            parent.is_some()
        );
        Ok(())
    }

    fn reattach_children(&self, moves: &[ParentMove]) -> RepoResult<usize> {
        if moves.is_empty() {
            return Ok(0);
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for item in moves {
            apply_move::<E>(&tx, item.node, item.parent)?;
        }
        tx.commit()?;

        info!(
            "event=tree_reattach module=repo status=ok entity={} moved={}",
            E::LABEL,
            moves.len()
        );
        Ok(moves.len())
    }
}

fn descendant_scope<E: TreeEntity>(entity: &E) -> (Vec<String>, Vec<Value>) {
    (
        vec![
            "substr(t.mpath, 1, length(?)) = ?".to_string(),
            "t.id <> ?".to_string(),
        ],
        vec![
            Value::Text(entity.mpath().to_string()),
            Value::Text(entity.mpath().to_string()),
            id_value(entity.id()),
        ],
    )
}

fn ancestor_scope<E: TreeEntity>(entity: &E) -> (Vec<String>, Vec<Value>) {
    (
        vec![
            "t.mpath <> ''".to_string(),
            "substr(?, 1, length(t.mpath)) = t.mpath".to_string(),
            "t.id <> ?".to_string(),
        ],
        vec![Value::Text(entity.mpath().to_string()), id_value(entity.id())],
    )
}

fn stored_mpath<E: SqlEntity>(conn: &Connection, id: EntityId) -> RepoResult<Option<String>> {
    let sql = format!("SELECT mpath FROM {} WHERE id = ?1;", E::TABLE);
    Ok(conn
        .query_row(&sql, [id.to_string()], |row| row.get::<_, String>(0))
        .optional()?)
}

pub(crate) fn apply_move<E: SqlEntity + TreeEntity>(
    conn: &Connection,
    id: EntityId,
    parent: Option<EntityId>,
) -> RepoResult<()> {
    let not_found = |id| RepoError::NotFound { entity: E::LABEL, id };
    let old_path = stored_mpath::<E>(conn, id)?.ok_or_else(|| not_found(id))?;

    let parent_path = match parent {
        None => String::new(),
        Some(parent_id) => {
            let path = stored_mpath::<E>(conn, parent_id)?.ok_or_else(|| not_found(parent_id))?;
            if parent_id == id || path.starts_with(&old_path) {
                return Err(RepoError::InvalidMove { id, parent: parent_id });
            }
            path
        }
    };
    let new_path = format!("{parent_path}{id}.");

    conn.execute(
        &format!("UPDATE {} SET parent_id = ?1 WHERE id = ?2;", E::TABLE),
        params![parent.map(|value| value.to_string()), id.to_string()],
    )?;
    if new_path != old_path {
        let old_len = i64::try_from(old_path.len()).unwrap_or(i64::MAX);
        conn.execute(
            &format!(
                "UPDATE {}
                 SET mpath = ?1 || substr(mpath, ?2)
                 WHERE substr(mpath, 1, ?3) = ?4;",
                E::TABLE
            ),
            params![new_path, old_len + 1, old_len, old_path],
        )?;
    }
    Ok(())
}
