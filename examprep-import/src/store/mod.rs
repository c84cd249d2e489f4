//! Row store abstraction
//!
//! The importer only needs one capability from its backing store:
//! insert-or-update a single row keyed by the table's conflict column.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::importer::ImportTable;

pub mod sqlite;

pub use sqlite::SqliteRowStore;

/// Store-side failure of a single operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store refused this row (constraint violation, bad column, malformed row)
    #[error("{0}")]
    Rejected(String),

    /// The store could not be reached at all
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Upsert-capable row store
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert `row` into `table`, or update the existing row with the same
    /// conflict-column value
    async fn upsert(&self, table: ImportTable, row: &Value) -> Result<(), StoreError>;

    /// Cheap liveness probe used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
