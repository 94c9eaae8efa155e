//! SQLite document-store adapter for the [`Datastore`] contract.
//!
//! # Responsibility
//! - Persist every object as one JSON document in `objects(kind, id, doc)`.
//! - Translate [`Filter`] predicates into JSON1 SQL with bound parameters.
//! - Implement the vote primitive inside one IMMEDIATE transaction.
//!
//! # Invariants
//! - All access goes through one connection guarded by a mutex, so the
//!   adapter can be shared across request threads and background workers.
//! - Field names in filters are validated before they reach a JSON path.
//! - Batch writes commit in one transaction each.

use crate::config::VoteWindowConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::record::{ObjectKey, ObjectKind};
use crate::model::vote::{Vote, VoteValue};
use crate::repo::datastore::{decide_vote, Datastore, Document, Filter, Patch, VoteOutcome};
use crate::repo::pager::{Pager, SortKey};
use crate::repo::{RepoError, RepoResult};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name regex"));

const NOW_MILLIS_SQL: &str = "(CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

/// Document store over one SQLite connection.
pub struct SqliteDatastore {
    conn: Mutex<Connection>,
}

impl SqliteDatastore {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Db(DbError::LockPoisoned))
    }
}

impl Datastore for SqliteDatastore {
    fn create_documents(&self, docs: &[Document]) -> RepoResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for doc in docs {
            upsert_document(&tx, doc)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_documents(&self, keys: &[ObjectKey]) -> RepoResult<HashMap<ObjectKey, Document>> {
        let conn = self.lock()?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(doc) = load_document(&conn, key.kind, &key.id)? {
                found.insert(key.clone(), doc);
            }
        }
        Ok(found)
    }

    fn update_documents(&self, docs: &[Document]) -> RepoResult<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "UPDATE objects
                 SET doc = ?3, updated_at = {NOW_MILLIS_SQL}
                 WHERE kind = ?1 AND id = ?2;"
            ))?;
            for doc in docs {
                changed += stmt.execute(params![
                    doc.kind.as_str(),
                    doc.id.as_str(),
                    serde_json::to_string(&doc.body)?
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn delete_all(&self, kind: ObjectKind, ids: &[String]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM objects WHERE kind = ?1 AND id = ?2;")?;
            for id in ids {
                deleted += stmt.execute(params![kind.as_str(), id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn find_documents(
        &self,
        kind: ObjectKind,
        filter: &Filter,
        pager: &mut Pager,
    ) -> RepoResult<Vec<Document>> {
        let mut where_sql = String::from("kind = ?");
        let mut binds = vec![SqlValue::Text(kind.as_str().to_string())];
        where_sql.push_str(" AND ");
        push_filter(filter, &mut where_sql, &mut binds)?;

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM objects WHERE {where_sql};"),
            params_from_iter(binds.iter()),
            |row| row.get(0),
        )?;

        let direction = if pager.desc { "DESC" } else { "ASC" };
        let mut sql = format!("SELECT id, doc FROM objects WHERE {where_sql}");
        if pager.uses_keyset() {
            if let Some(last_key) = pager.last_key.as_ref() {
                sql.push_str(if pager.desc { " AND id < ?" } else { " AND id > ?" });
                binds.push(SqlValue::Text(last_key.clone()));
            }
        }
        let order = match pager.sort_by {
            SortKey::Id => format!("id {direction}"),
            SortKey::CreatedAt => format!("created_at {direction}, id {direction}"),
            SortKey::UpdatedAt => format!("updated_at {direction}, id {direction}"),
        };
        sql.push_str(&format!(" ORDER BY {order} LIMIT ?"));
        binds.push(SqlValue::Integer(i64::from(pager.limit)));
        if !pager.uses_keyset() && pager.offset() > 0 {
            sql.push_str(" OFFSET ?");
            binds.push(SqlValue::Integer(
                i64::try_from(pager.offset()).unwrap_or(i64::MAX),
            ));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get("id")?;
            let text: String = row.get("doc")?;
            docs.push(parse_document(kind, id, &text)?);
        }

        pager.advance(
            docs.last().map(|doc| doc.id.as_str()),
            u64::try_from(total).unwrap_or(0),
        );
        debug!(
            "event=find_documents module=repo status=ok kind={} page={} rows={} total={}",
            kind,
            pager.page,
            docs.len(),
            total
        );
        Ok(docs)
    }

    fn count(&self, kind: ObjectKind, filter: &Filter) -> RepoResult<u64> {
        let mut where_sql = String::from("kind = ? AND ");
        let mut binds = vec![SqlValue::Text(kind.as_str().to_string())];
        push_filter(filter, &mut where_sql, &mut binds)?;
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM objects WHERE {where_sql};"),
            params_from_iter(binds.iter()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn patch_all(&self, kind: ObjectKind, patches: &[Patch]) -> RepoResult<usize> {
        let patches: Vec<&Patch> = patches.iter().filter(|patch| !patch.is_empty()).collect();
        if patches.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "UPDATE objects
                 SET doc = json_patch(doc, ?3), updated_at = {NOW_MILLIS_SQL}
                 WHERE kind = ?1 AND id = ?2;"
            ))?;
            for patch in &patches {
                let body = serde_json::to_string(&patch.fields)?;
                let touched = stmt.execute(params![kind.as_str(), patch.id.as_str(), body])?;
                if touched == 0 {
                    warn!(
                        "event=patch_all module=repo status=skip kind={} id={} reason=missing",
                        kind, patch.id
                    );
                }
                changed += touched;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn vote(
        &self,
        target: &ObjectKey,
        voter_id: &str,
        value: VoteValue,
        window: VoteWindowConfig,
        now_millis: i64,
    ) -> RepoResult<VoteOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let vote_id = Vote::id_for(voter_id, &target.id);
        let existing = match load_document(&tx, ObjectKind::Vote, &vote_id)? {
            Some(doc) => Some(doc.decode::<Vote>()?),
            None => None,
        };
        let outcome = decide_vote(existing.as_ref(), value, now_millis);
        if !outcome.is_applied() {
            return Ok(outcome);
        }

        let changed = tx.execute(
            &format!(
                "UPDATE objects
                 SET doc = json_set(doc, '$.votes', COALESCE(json_extract(doc, '$.votes'), 0) + ?3),
                     updated_at = {NOW_MILLIS_SQL}
                 WHERE kind = ?1 AND id = ?2;"
            ),
            params![
                target.kind.as_str(),
                target.id.as_str(),
                outcome.counter_delta(value)
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(target.clone()));
        }

        let vote = Vote::new(
            voter_id,
            &target.id,
            value,
            now_millis,
            window.expires_after_sec,
            window.locked_after_sec,
        );
        upsert_document(&tx, &Document::from_record(&vote)?)?;
        tx.commit()?;
        Ok(outcome)
    }
}

fn upsert_document(conn: &Connection, doc: &Document) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(&format!(
        "INSERT INTO objects (kind, id, doc)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (kind, id) DO UPDATE
         SET doc = excluded.doc, updated_at = {NOW_MILLIS_SQL};"
    ))?;
    stmt.execute(params![
        doc.kind.as_str(),
        doc.id.as_str(),
        serde_json::to_string(&doc.body)?
    ])?;
    Ok(())
}

fn load_document(conn: &Connection, kind: ObjectKind, id: &str) -> RepoResult<Option<Document>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT doc FROM objects WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;
    text.map(|text| parse_document(kind, id.to_string(), &text))
        .transpose()
}

fn parse_document(kind: ObjectKind, id: String, text: &str) -> RepoResult<Document> {
    let body = serde_json::from_str(text).map_err(|err| {
        RepoError::InvalidData(format!("objects.doc for {kind}/{id} is not JSON: {err}"))
    })?;
    Ok(Document { kind, id, body })
}

fn json_path(field: &str) -> RepoResult<String> {
    if !FIELD_NAME_RE.is_match(field) {
        return Err(RepoError::InvalidQuery(format!(
            "field name `{field}` is not a plain identifier"
        )));
    }
    Ok(format!("$.{field}"))
}

fn push_filter(filter: &Filter, sql: &mut String, binds: &mut Vec<SqlValue>) -> RepoResult<()> {
    match filter {
        Filter::All => sql.push_str("1 = 1"),
        Filter::Tagged(tags) => {
            if tags.is_empty() {
                sql.push_str("1 = 1");
            }
            for (idx, tag) in tags.iter().enumerate() {
                if idx > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(
                    "EXISTS (SELECT 1 FROM json_each(objects.doc, '$.tags') AS jt WHERE jt.value = ?)",
                );
                binds.push(SqlValue::Text(tag.clone()));
            }
        }
        Filter::FieldEquals { field, value } => {
            let path = json_path(field)?;
            match scalar_to_sql(value)? {
                None => {
                    sql.push_str("json_extract(objects.doc, ?) IS NULL");
                    binds.push(SqlValue::Text(path));
                }
                Some(bound) => {
                    sql.push_str("json_extract(objects.doc, ?) = ?");
                    binds.push(SqlValue::Text(path));
                    binds.push(bound);
                }
            }
        }
        Filter::TermInList { field, terms } => {
            if terms.is_empty() {
                sql.push_str("0 = 1");
                return Ok(());
            }
            sql.push_str(
                "EXISTS (SELECT 1 FROM json_each(objects.doc, ?) AS jf
                         WHERE jf.value IN (SELECT value FROM json_each(?)))",
            );
            binds.push(SqlValue::Text(json_path(field)?));
            binds.push(SqlValue::Text(serde_json::to_string(terms)?));
        }
        Filter::And(filters) => {
            if filters.is_empty() {
                sql.push_str("1 = 1");
                return Ok(());
            }
            sql.push('(');
            for (idx, inner) in filters.iter().enumerate() {
                if idx > 0 {
                    sql.push_str(" AND ");
                }
                push_filter(inner, sql, binds)?;
            }
            sql.push(')');
        }
    }
    Ok(())
}

fn scalar_to_sql(value: &Value) -> RepoResult<Option<SqlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(SqlValue::Integer(i64::from(*flag)))),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => Ok(Some(SqlValue::Integer(int))),
            (None, Some(real)) => Ok(Some(SqlValue::Real(real))),
            _ => Err(RepoError::InvalidQuery(format!(
                "unsupported number `{number}`"
            ))),
        },
        Value::String(text) => Ok(Some(SqlValue::Text(text.clone()))),
        Value::Array(_) | Value::Object(_) => Err(RepoError::InvalidQuery(
            "field equality only supports scalar values".to_string(),
        )),
    }
}
