//! SQLite FTS5 document index.
//!
//! # Responsibility
//! - Store post documents as JSON payloads keyed by `(index_name, id)`.
//! - Mirror searchable text into `search_documents_fts`.
//! - Answer paged keyword queries with filters and deterministic ordering.
//!
//! # Invariants
//! - `search_documents_fts.rowid` equals the `search_documents.rowid` of the
//!   document it mirrors.
//! - Writes of one batch commit together.

use super::index::{DocumentIndex, PostDocument, SearchHits, SearchParams, SortField};
use super::{SearchError, SearchResult};
use crate::db::DbError;
use crate::model::EntityId;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};

pub struct SqliteDocumentIndex<'conn> {
    conn: &'conn Connection,
    index: String,
}

impl<'conn> SqliteDocumentIndex<'conn> {
    pub fn new(conn: &'conn Connection, index: impl Into<String>) -> Self {
        Self {
            conn,
            index: index.into(),
        }
    }

    fn upsert(&self, documents: &[PostDocument]) -> SearchResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for document in documents {
            upsert_document(&tx, &self.index, document)?;
        }
        tx.commit()?;

        debug!(
            "event=index_write module=search status=ok index={} documents={}",
            self.index,
            documents.len()
        );
        Ok(documents.len())
    }
}

impl DocumentIndex for SqliteDocumentIndex<'_> {
    fn name(&self) -> &str {
        &self.index
    }

    fn add_documents(&self, documents: &[PostDocument]) -> SearchResult<usize> {
        self.upsert(documents)
    }

    fn update_documents(&self, documents: &[PostDocument]) -> SearchResult<usize> {
        self.upsert(documents)
    }

    fn delete_documents(&self, ids: &[EntityId]) -> SearchResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut deleted = 0;
        for id in ids {
            if let Some(rowid) = document_rowid(&tx, &self.index, *id)? {
                tx.execute("DELETE FROM search_documents_fts WHERE rowid = ?1;", [rowid])?;
                tx.execute("DELETE FROM search_documents WHERE rowid = ?1;", [rowid])?;
                deleted += 1;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn search(&self, text: &str, params: &SearchParams) -> SearchResult<SearchHits> {
        let page = params.page.max(1);
        let limit = params.limit.max(1);
        let match_expr = build_match_expression(text);

        let mut from_sql = String::from("FROM search_documents d");
        let mut conditions = vec!["d.index_name = ?".to_string()];
        let mut binds = vec![Value::Text(self.index.clone())];
        if let Some(expr) = &match_expr {
            from_sql.push_str(" JOIN search_documents_fts ON search_documents_fts.rowid = d.rowid");
            conditions.push("search_documents_fts MATCH ?".to_string());
            binds.push(Value::Text(expr.clone()));
        }
        conditions.extend(params.filter.trash.sql("d.deleted_at"));
        match params.filter.published {
            Some(true) => conditions.push("d.published_at IS NOT NULL".to_string()),
            Some(false) => conditions.push("d.published_at IS NULL".to_string()),
            None => {}
        }
        let where_sql = format!("WHERE {}", conditions.join(" AND "));
        let query_text = match_expr.as_deref().unwrap_or_default();

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) {from_sql} {where_sql}"),
                params_from_iter(binds.clone()),
                |row| row.get(0),
            )
            .map_err(|err| map_query_error(err, query_text))?;

        let order_by = order_clause(&params.sort, match_expr.is_some());
        binds.push(Value::Integer(i64::from(limit)));
        binds.push(Value::Integer(i64::from(page - 1) * i64::from(limit)));
        let sql = format!(
            "SELECT d.payload AS payload {from_sql} {where_sql} ORDER BY {order_by} LIMIT ? OFFSET ?"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt
            .query(params_from_iter(binds))
            .map_err(|err| map_query_error(err, query_text))?;
        let mut hits = Vec::new();
        while let Some(row) = rows.next().map_err(|err| map_query_error(err, query_text))? {
            let payload: String = row.get("payload")?;
            hits.push(decode_document(&payload)?);
        }

        let total = u64::try_from(total).unwrap_or_default();
        Ok(SearchHits {
            hits,
            page,
            hits_per_page: limit,
            estimated_total_hits: total,
            total_hits: total,
        })
    }
}

fn upsert_document(conn: &Connection, index: &str, document: &PostDocument) -> SearchResult<()> {
    let payload = serde_json::to_string(document)
        .map_err(|err| SearchError::InvalidData(format!("unencodable document {}: {err}", document.id)))?;

    let rowid = match document_rowid(conn, index, document.id)? {
        Some(rowid) => {
            conn.execute(
                "UPDATE search_documents
                 SET payload = ?2, deleted_at = ?3, published_at = ?4, updated_at = ?5, comment_count = ?6
                 WHERE rowid = ?1;",
                params![
                    rowid,
                    payload,
                    document.deleted_at,
                    document.published_at,
                    document.updated_at,
                    document.comment_count,
                ],
            )?;
            conn.execute("DELETE FROM search_documents_fts WHERE rowid = ?1;", [rowid])?;
            rowid
        }
        None => {
            conn.execute(
                "INSERT INTO search_documents (
                    index_name, id, payload, deleted_at, published_at, updated_at, comment_count
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    index,
                    document.id.to_string(),
                    payload,
                    document.deleted_at,
                    document.published_at,
                    document.updated_at,
                    document.comment_count,
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    conn.execute(
        "INSERT INTO search_documents_fts (rowid, title, body, summary, categories, tags, comments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            rowid,
            document.title,
            document.body,
            format!("{} {}", document.summary, document.keywords.join(" ")),
            join_names(document.categories.iter().map(|item| item.name.as_str())),
            join_names(document.tags.iter().map(|item| item.name.as_str())),
            join_names(document.comments.iter().map(|item| item.body.as_str())),
        ],
    )?;
    Ok(())
}

fn document_rowid(conn: &Connection, index: &str, id: EntityId) -> SearchResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT rowid FROM search_documents WHERE index_name = ?1 AND id = ?2;",
            params![index, id.to_string()],
            |row| row.get(0),
        )
        .optional()?)
}

fn decode_document(payload: &str) -> SearchResult<PostDocument> {
    serde_json::from_str(payload).map_err(|err| SearchError::InvalidData(err.to_string()))
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(" ")
}

fn order_clause(sort: &[SortField], has_match: bool) -> String {
    let mut parts: Vec<&str> = sort
        .iter()
        .filter_map(|field| match field {
            SortField::Relevance if has_match => Some("bm25(search_documents_fts)"),
            SortField::Relevance => None,
            SortField::UpdatedAtDesc => Some("d.updated_at DESC"),
            SortField::PublishedAtDesc => Some("d.published_at DESC"),
            SortField::CommentCountDesc => Some("d.comment_count DESC"),
        })
        .collect();
    parts.push("d.rowid ASC");
    parts.join(", ")
}

/// Quotes every whitespace-separated term and joins them with `AND`.
fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }
    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_match_expression, order_clause};
    use crate::search::SortField;

    #[test]
    fn match_expression_quotes_terms() {
        assert_eq!(
            build_match_expression(r#"rust "tree"#).as_deref(),
            Some(r#""rust" AND """tree""#)
        );
        assert_eq!(build_match_expression("   "), None);
    }

    #[test]
    fn relevance_needs_a_match_clause() {
        let sort = [SortField::Relevance, SortField::UpdatedAtDesc];
        assert_eq!(order_clause(&sort, false), "d.updated_at DESC, d.rowid ASC");
        assert!(order_clause(&sort, true).starts_with("bm25("));
    }
}
