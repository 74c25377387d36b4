//! Generic SQL shared by every content table.
//!
//! # Responsibility
//! - Describe how an entity maps to its table (`SqlEntity`).
//! - Provide id-batch reads and writes (find, remove, soft remove, restore).
//! - Provide the flat list/paginate implementation with offset/limit pushdown.
//!
//! # Invariants
//! - Every projection aliases the table as `t`.
//! - Empty id batches never reach SQLite.

use super::{RepoError, RepoResult};
use crate::model::{Entity, EntityId, TrashFilter};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::marker::PhantomData;
use uuid::Uuid;

pub trait SqlEntity: Entity + Sized {
    const TABLE: &'static str;
    /// Select list over alias `t`, every column aliased to its field name.
    const COLUMNS: &'static str;
    /// Default ordering, ties broken by storage order.
    const ORDER_BY: &'static str;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Loads relations stored outside the entity's own row.
    fn hydrate(_conn: &Connection, _items: &mut [Self]) -> RepoResult<()> {
        Ok(())
    }
}

/// Extra `WHERE` conditions with their positional binds, plus an optional
/// ordering override.
#[derive(Debug, Clone, Default)]
pub struct SqlFilter {
    conditions: Vec<String>,
    binds: Vec<Value>,
    order_by: Option<String>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one condition; `?` placeholders bind to `binds` in order.
    pub fn condition(mut self, sql: impl Into<String>, binds: impl IntoIterator<Item = Value>) -> Self {
        self.conditions.push(sql.into());
        self.binds.extend(binds);
        self
    }

    pub fn order_by(mut self, sql: impl Into<String>) -> Self {
        self.order_by = Some(sql.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.order_by.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub trash: TrashFilter,
    pub filter: SqlFilter,
}

impl ListQuery {
    pub fn new(trash: TrashFilter) -> Self {
        Self {
            trash,
            filter: SqlFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: SqlFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Batch operations every repository offers.
pub trait EntityRepository<E: Entity> {
    fn label(&self) -> &'static str {
        E::LABEL
    }

    fn find_one(&self, id: EntityId, trash: TrashFilter) -> RepoResult<Option<E>>;

    /// Rows for `ids` in default order; unknown ids are skipped.
    fn find_by_ids(&self, ids: &[EntityId], with_trashed: bool) -> RepoResult<Vec<E>>;

    /// Hard-deletes `items` in one statement and returns the affected count.
    fn remove(&self, items: &[E]) -> RepoResult<usize>;

    /// Trashes `items` and returns them refreshed.
    fn soft_remove(&self, items: &[E]) -> RepoResult<Vec<E>>;

    /// Clears `deleted_at` for `ids` and returns the affected count.
    fn restore(&self, ids: &[EntityId]) -> RepoResult<usize>;
}

/// Flat listing with relational pagination.
pub trait FlatRepository<E: Entity>: EntityRepository<E> {
    fn list(&self, query: &ListQuery) -> RepoResult<Vec<E>>;

    /// Returns one page of rows plus the total row count of the query.
    fn paginate(&self, query: &ListQuery, offset: u64, limit: u64) -> RepoResult<(Vec<E>, u64)>;
}

/// SQLite repository for any [`SqlEntity`].
pub struct SqliteRepository<'conn, E> {
    conn: &'conn Connection,
    _entity: PhantomData<E>,
}

impl<'conn, E: SqlEntity> SqliteRepository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

impl<E: SqlEntity> EntityRepository<E> for SqliteRepository<'_, E> {
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

impl<E: SqlEntity> FlatRepository<E> for SqliteRepository<'_, E> {
    fn list(&self, query: &ListQuery) -> RepoResult<Vec<E>> {
        let (where_sql, binds) = where_clause(query);
        let order_by = query.filter.order_by.as_deref().unwrap_or(E::ORDER_BY);
        select(self.conn, &format!("{where_sql} ORDER BY {order_by}"), binds)
    }

    fn paginate(&self, query: &ListQuery, offset: u64, limit: u64) -> RepoResult<(Vec<E>, u64)> {
        let (where_sql, mut binds) = where_clause(query);
        let total = count::<E>(self.conn, &where_sql, binds.clone())?;

        let order_by = query.filter.order_by.as_deref().unwrap_or(E::ORDER_BY);
        binds.push(Value::Integer(to_sql_int(limit)));
        binds.push(Value::Integer(to_sql_int(offset)));
        let items = select(
            self.conn,
            &format!("{where_sql} ORDER BY {order_by} LIMIT ? OFFSET ?"),
            binds,
        )?;
        Ok((items, total))
    }
}

fn where_clause(query: &ListQuery) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = query.trash.sql("t.deleted_at").into_iter().collect();
    conditions.extend(query.filter.conditions.iter().cloned());
    (where_sql(&conditions), query.filter.binds.clone())
}

pub(crate) fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Runs `SELECT {COLUMNS} FROM {TABLE} t {tail}` and hydrates the rows.
pub(crate) fn select<E: SqlEntity>(conn: &Connection, tail: &str, binds: Vec<Value>) -> RepoResult<Vec<E>> {
    let sql = format!("SELECT {} FROM {} t {tail}", E::COLUMNS, E::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(E::from_row(row)?);
    }
    E::hydrate(conn, &mut items)?;
    Ok(items)
}

pub(crate) fn count<E: SqlEntity>(conn: &Connection, where_sql: &str, binds: Vec<Value>) -> RepoResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {} t {where_sql}", E::TABLE);
    let total: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
    Ok(u64::try_from(total).unwrap_or_default())
}

pub(crate) fn find_one<E: SqlEntity>(conn: &Connection, id: EntityId, trash: TrashFilter) -> RepoResult<Option<E>> {
    let mut conditions = vec!["t.id = ?".to_string()];
    conditions.extend(trash.sql("t.deleted_at"));
    let mut items = select::<E>(conn, &where_sql(&conditions), vec![id_value(id)])?;
    Ok(items.pop())
}

pub(crate) fn find_by_ids<E: SqlEntity>(conn: &Connection, ids: &[EntityId], with_trashed: bool) -> RepoResult<Vec<E>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let (placeholders, binds) = id_list(ids);
    let mut conditions = vec![format!("t.id IN ({placeholders})")];
    conditions.extend(TrashFilter::new(with_trashed, false).sql("t.deleted_at"));
    select(conn, &format!("{} ORDER BY {}", where_sql(&conditions), E::ORDER_BY), binds)
}

pub(crate) fn delete_by_ids<E: SqlEntity>(conn: &Connection, ids: &[EntityId]) -> RepoResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let (placeholders, binds) = id_list(ids);
    let sql = format!("DELETE FROM {} WHERE id IN ({placeholders});", E::TABLE);
    Ok(conn.execute(&sql, params_from_iter(binds))?)
}

pub(crate) fn soft_remove<E: SqlEntity>(conn: &Connection, items: &[E]) -> RepoResult<Vec<E>> {
    let ids = ids_of(items);
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let (placeholders, binds) = id_list(&ids);
    let sql = format!(
        "UPDATE {}
         SET deleted_at = (strftime('%s', 'now') * 1000)
         WHERE id IN ({placeholders})
           AND deleted_at IS NULL;",
        E::TABLE
    );
    conn.execute(&sql, params_from_iter(binds))?;
    find_by_ids(conn, &ids, true)
}

pub(crate) fn restore_by_ids<E: SqlEntity>(conn: &Connection, ids: &[EntityId]) -> RepoResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let (placeholders, binds) = id_list(ids);
    let sql = format!(
        "UPDATE {} SET deleted_at = NULL WHERE id IN ({placeholders}) AND deleted_at IS NOT NULL;",
        E::TABLE
    );
    Ok(conn.execute(&sql, params_from_iter(binds))?)
}

pub(crate) fn ids_of<E: Entity>(items: &[E]) -> Vec<EntityId> {
    items.iter().map(Entity::id).collect()
}

pub(crate) fn id_value(id: EntityId) -> Value {
    Value::Text(id.to_string())
}

/// `?, ?, ?` placeholders with one text bind per id.
pub(crate) fn id_list(ids: &[EntityId]) -> (String, Vec<Value>) {
    let placeholders = vec!["?"; ids.len()].join(", ");
    (placeholders, ids.iter().copied().map(id_value).collect())
}

pub(crate) fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(value: Option<String>, column: &'static str) -> RepoResult<Option<Uuid>> {
    value.map(|value| parse_uuid(&value, column)).transpose()
}
