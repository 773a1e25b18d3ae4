//! SQLite implementation of the backend client
//!
//! Every collection lives in one `records` table as JSON documents keyed by
//! (collection, id). Equality filters and sort keys are evaluated with
//! SQLite's `json_extract`, so the schema never has to change when a model
//! gains a field.

use super::{
    AuthEvent, Backend, BackendError, Collection, Filter, Identity, Query, Record,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const AUTH_CHANNEL_CAPACITY: usize = 16;

/// Formats a timestamp the way the backend stores it: fixed-width
/// microseconds so stored strings sort chronologically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    identity: Mutex<Option<Identity>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl SqliteBackend {
    /// Opens (or creates) a database file and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, BackendError> {
        init_schema(&conn)?;
        let (auth_events, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            identity: Mutex::new(None),
            auth_events,
        })
    }

    /// Marks `identity` as the authenticated user and notifies subscribers.
    pub fn sign_in(&self, identity: Identity) {
        *lock(&self.identity) = Some(identity.clone());
        // No subscribers is fine; the event is simply dropped.
        let _ = self.auth_events.send(AuthEvent::SignedIn(identity));
    }

    pub fn sign_out(&self) {
        *lock(&self.identity) = None;
        let _ = self.auth_events.send(AuthEvent::SignedOut);
    }

    pub fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        lock(&self.conn)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates the document table if it does not exist yet.
fn init_schema(conn: &Connection) -> Result<(), BackendError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            UNIQUE(collection, id)
        )",
        (),
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
        (),
    )?;

    Ok(())
}

/// Converts a JSON operand to the SQL value `json_extract` would yield.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

/// Builds the WHERE clause for `filter`, appending bound parameters.
fn where_clause(collection: Collection, filter: &Filter, params: &mut Vec<SqlValue>) -> String {
    params.push(SqlValue::Text(collection.name().to_string()));
    let mut sql = format!("collection = ?{}", params.len());

    for (field, value) in &filter.conditions {
        params.push(SqlValue::Text(json_path(field)));
        let path_idx = params.len();
        params.push(sql_value(value));
        let value_idx = params.len();
        sql.push_str(&format!(
            " AND json_extract(data, ?{path_idx}) IS ?{value_idx}"
        ));
    }

    sql
}

fn id_of(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn parse_row(collection: Collection, data: &str) -> Result<Record, BackendError> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Corrupt {
            collection: collection.name(),
            reason: format!("row is not an object: {other}"),
        }),
    }
}

impl Backend for SqliteBackend {
    fn current_identity(&self) -> Option<Identity> {
        lock(&self.identity).clone()
    }

    fn fetch(&self, collection: Collection, query: &Query) -> Result<Vec<Record>, BackendError> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT data FROM records WHERE {}",
            where_clause(collection, &query.filter, &mut params)
        );

        // Ascending keys put nulls last, descending keys put them first.
        let mut order_terms = Vec::new();
        for order in &query.order {
            params.push(SqlValue::Text(json_path(&order.field)));
            let idx = params.len();
            let direction = if order.descending { "DESC" } else { "ASC" };
            order_terms.push(format!("(json_extract(data, ?{idx}) IS NULL) {direction}"));
            order_terms.push(format!("json_extract(data, ?{idx}) {direction}"));
        }
        let tie_break = match query.order.first() {
            Some(order) if order.descending => "seq DESC",
            _ => "seq ASC",
        };
        order_terms.push(tie_break.to_string());
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms.join(", "));

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        rows.iter().map(|data| parse_row(collection, data)).collect()
    }

    fn fetch_one(&self, collection: Collection, filter: &Filter) -> Result<Record, BackendError> {
        let query = Query::new(filter.clone()).limit(1);
        self.fetch(collection, &query)?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }

    fn insert(&self, collection: Collection, mut record: Record) -> Result<Record, BackendError> {
        let id = match id_of(&record) {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        if record.get("created_at").is_none_or(Value::is_null) {
            record.insert(
                "created_at".to_string(),
                Value::String(timestamp(Utc::now())),
            );
        }

        let data = serde_json::to_string(&record)?;
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO records (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection.name(), id, data],
        );

        match result {
            Ok(_) => Ok(record),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(BackendError::DuplicateKey(format!(
                    "{}.id = {id}",
                    collection.name()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(
        &self,
        collection: Collection,
        filter: &Filter,
        patch: Record,
    ) -> Result<(), BackendError> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT seq, data FROM records WHERE {}",
            where_clause(collection, filter, &mut params)
        );

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = {
            let mut stmt = tx.prepare(&sql)?;
            stmt.query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<(i64, String)>, _>>()?
        };

        for (seq, data) in rows {
            let mut record = parse_row(collection, &data)?;
            for (key, value) in &patch {
                record.insert(key.clone(), value.clone());
            }
            let id = id_of(&record).unwrap_or_default();
            tx.execute(
                "UPDATE records SET id = ?1, data = ?2 WHERE seq = ?3",
                params![id, serde_json::to_string(&record)?, seq],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: Collection, filter: &Filter) -> Result<(), BackendError> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM records WHERE {}",
            where_clause(collection, filter, &mut params)
        );
        self.conn().execute(&sql, params_from_iter(params))?;
        Ok(())
    }
}
