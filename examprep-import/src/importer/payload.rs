//! Import payload validation
//!
//! Accepts `{ "data": { "tables": { <table>: [row, ...], ... } } }` and keeps
//! the rows of every recognized, non-empty table in processing order.

use examprep_common::config::UnknownTablePolicy;
use serde_json::Value;
use tracing::debug;

use super::{ImportError, ImportTable};

/// Message returned for any structurally invalid payload
pub const INVALID_FORMAT: &str = "Invalid import data format";

/// A validated import payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPayload {
    tables: Vec<(ImportTable, Vec<Value>)>,
}

impl ImportPayload {
    /// Parse and validate a raw request body
    pub fn from_slice(body: &[u8], policy: UnknownTablePolicy) -> Result<Self, ImportError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            debug!("Rejected unparsable import body: {}", e);
            ImportError::Validation(INVALID_FORMAT.to_string())
        })?;
        Self::from_body(&value, policy)
    }

    /// Validate an already parsed request body
    pub fn from_body(body: &Value, policy: UnknownTablePolicy) -> Result<Self, ImportError> {
        let tables = body
            .get("data")
            .and_then(|data| data.get("tables"))
            .and_then(Value::as_object)
            .ok_or_else(|| ImportError::Validation(INVALID_FORMAT.to_string()))?;

        for name in tables.keys() {
            if ImportTable::from_name(name).is_some() {
                continue;
            }
            match policy {
                UnknownTablePolicy::Ignore => debug!("Ignoring unknown import table '{}'", name),
                UnknownTablePolicy::Reject => {
                    return Err(ImportError::Validation(format!(
                        "Unknown import table: {}",
                        name
                    )))
                }
            }
        }

        let mut selected = Vec::new();
        for table in ImportTable::ORDER {
            match tables.get(table.name()) {
                None | Some(Value::Null) => {}
                Some(Value::Array(rows)) if rows.is_empty() => {}
                Some(Value::Array(rows)) => selected.push((table, rows.clone())),
                Some(_) => {
                    return Err(ImportError::Validation(format!(
                        "{}: '{}' must be an array of rows",
                        INVALID_FORMAT, table
                    )))
                }
            }
        }

        Ok(Self { tables: selected })
    }

    /// Build a payload directly from table rows
    ///
    /// Tables are reordered into processing order and empty tables dropped.
    pub fn from_tables(tables: impl IntoIterator<Item = (ImportTable, Vec<Value>)>) -> Self {
        let mut tables: Vec<_> = tables
            .into_iter()
            .filter(|(_, rows)| !rows.is_empty())
            .collect();
        tables.sort_by_key(|(table, _)| *table);
        Self { tables }
    }

    /// Tables to process, in processing order, with their rows
    pub fn tables(&self) -> impl Iterator<Item = (ImportTable, &[Value])> {
        self.tables.iter().map(|(table, rows)| (*table, rows.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total rows across all tables
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows.len()).sum()
    }
}
