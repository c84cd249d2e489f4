//! SQLite-backed row store
//!
//! Rows are free-form JSON objects; each key becomes a column in an
//! `INSERT ... ON CONFLICT(id) DO UPDATE` statement. Column names are
//! validated before being interpolated into SQL, values are always bound.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

use super::{RowStore, StoreError};
use crate::importer::ImportTable;

/// Row store over an sqlx SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteRowStore {
    pool: SqlitePool,
}

impl SqliteRowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn upsert(&self, table: ImportTable, row: &Value) -> Result<(), StoreError> {
        let object = row
            .as_object()
            .ok_or_else(|| StoreError::Rejected("row is not a JSON object".to_string()))?;

        let conflict = table.conflict_column();
        if matches!(object.get(conflict), None | Some(Value::Null)) {
            return Err(StoreError::Rejected(format!(
                "missing required column '{}'",
                conflict
            )));
        }

        let columns: Vec<&str> = object.keys().map(String::as_str).collect();
        if let Some(bad) = columns.iter().find(|c| !is_valid_column_name(c)) {
            return Err(StoreError::Rejected(format!("invalid column name '{}'", bad)));
        }

        let sql = build_upsert_sql(table, &columns);
        let mut query = sqlx::query(&sql);
        for value in object.values() {
            query = bind_value(query, value);
        }

        query.execute(&self.pool).await.map_err(classify)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// Only allow alphanumeric and underscore (identifiers are interpolated)
fn is_valid_column_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Build the upsert statement for `columns` (already validated)
fn build_upsert_sql(table: ImportTable, columns: &[&str]) -> String {
    let conflict = table.conflict_column();
    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");

    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != conflict)
        .map(|c| format!("\"{0}\" = excluded.\"{0}\"", c))
        .collect();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT(\"{}\") {}",
        table.name(),
        column_list,
        placeholders,
        conflict,
        action
    )
}

/// Bind a JSON value using the closest SQLite storage class
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => query.bind(i),
            // Beyond i64: keep every digit as text so distinct ids stay distinct
            (None, Some(_)) => query.bind(n.to_string()),
            (None, None) => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        // Arrays and objects are stored as JSON text
        other => query.bind(other.to_string()),
    }
}

/// Split sqlx errors into per-row rejections and infrastructure failures
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if is_infrastructure_code(db_err.code().as_deref()) => {
            StoreError::Unavailable(db_err.message().to_string())
        }
        sqlx::Error::Database(db_err) => StoreError::Rejected(db_err.message().to_string()),
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Rejected(err.to_string()),
    }
}

/// SQLite primary result codes that describe the database, not the row:
/// BUSY, LOCKED, NOMEM, READONLY, IOERR, CORRUPT, FULL, CANTOPEN, NOTADB
const INFRASTRUCTURE_CODES: [i32; 9] = [5, 6, 7, 8, 10, 11, 13, 14, 26];

/// sqlx reports the extended result code; its low byte is the primary code
fn is_infrastructure_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|extended| INFRASTRUCTURE_CODES.contains(&(extended & 0xff)))
        .unwrap_or(false)
}
