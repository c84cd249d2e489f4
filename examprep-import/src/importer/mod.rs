//! Bulk reconciliation importer
//!
//! Applies a multi-table payload against a [`RowStore`]:
//! - tables are processed in the fixed order of [`ImportTable::ORDER`] so
//!   referenced rows exist before the rows that reference them
//! - each row is upserted on its own; a rejected row is recorded and the
//!   import moves on
//! - a store that cannot be reached aborts the whole import
//!
//! Nothing survives between calls: an import is a function of the payload
//! and the store.

use std::sync::Arc;

use examprep_common::config::{UnknownTablePolicy, DEFAULT_ROW_CONCURRENCY};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::store::{RowStore, StoreError};

mod payload;
mod report;
mod table;

pub use payload::{ImportPayload, INVALID_FORMAT};
pub use report::{ImportReport, ImportSummary, TableOutcome, TableResults};
pub use table::ImportTable;

/// Request-level import failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The payload is malformed; nothing was written
    #[error("{0}")]
    Validation(String),

    /// Unexpected failure while importing; no report is produced
    #[error("{0}")]
    Internal(String),
}

/// One row the store rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} {}: {}", .table.label(), .key, .message)]
pub struct RowError {
    pub table: ImportTable,
    /// Natural key of the row (name, email or id)
    pub key: String,
    /// Store error text
    pub message: String,
}

/// Importer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Upserts of the same table allowed in flight at once
    pub row_concurrency: usize,
    /// Handling of unrecognized table names
    pub unknown_tables: UnknownTablePolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            row_concurrency: DEFAULT_ROW_CONCURRENCY,
            unknown_tables: UnknownTablePolicy::Ignore,
        }
    }
}

/// Applies import payloads to a row store
#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn RowStore>,
    options: ImportOptions,
}

impl Importer {
    pub fn new(store: Arc<dyn RowStore>, options: ImportOptions) -> Self {
        Self { store, options }
    }

    /// Parse a raw request body with this importer's unknown-table policy
    pub fn parse(&self, body: &[u8]) -> Result<ImportPayload, ImportError> {
        ImportPayload::from_slice(body, self.options.unknown_tables)
    }

    /// Apply every table of `payload` in processing order
    pub async fn run(&self, payload: &ImportPayload) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();

        for (table, rows) in payload.tables() {
            let outcome = self.import_table(table, rows).await?;
            info!(
                "Imported {}: {} of {} rows ({} failed)",
                table,
                outcome.inserted,
                rows.len(),
                outcome.errors.len()
            );
            report.record(table, outcome);
        }

        Ok(report)
    }

    /// Upsert the rows of one table, in input order
    async fn import_table(
        &self,
        table: ImportTable,
        rows: &[Value],
    ) -> Result<TableOutcome, ImportError> {
        let store = &self.store;
        // Indices rather than `&Value` items keep the handler future `Send`
        let mut upserts = stream::iter(0..rows.len())
            .map(move |i| async move { (&rows[i], store.upsert(table, &rows[i]).await) })
            .buffered(self.options.row_concurrency.max(1));

        let mut results = Vec::with_capacity(rows.len());
        while let Some((row, result)) = upserts.next().await {
            match result {
                Ok(()) => results.push(Ok(())),
                Err(StoreError::Rejected(message)) => {
                    let err = RowError {
                        table,
                        key: table.natural_key(row),
                        message,
                    };
                    warn!("Import row failed: {}", err);
                    results.push(Err(err));
                }
                Err(unavailable @ StoreError::Unavailable(_)) => {
                    error!("Aborting import of {}: {}", table, unavailable);
                    return Err(ImportError::Internal(unavailable.to_string()));
                }
            }
        }

        Ok(TableOutcome::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every upsert and rejects rows whose id starts with "bad"
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(ImportTable, String)>>,
    }

    #[async_trait]
    impl RowStore for RecordingStore {
        async fn upsert(&self, table: ImportTable, row: &Value) -> Result<(), StoreError> {
            let id = row["id"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push((table, id.clone()));
            if id.starts_with("bad") {
                Err(StoreError::Rejected("rejected by test store".to_string()))
            } else if id == "down" {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_row_error_message_names_row() {
        let err = RowError {
            table: ImportTable::Profiles,
            key: "ada@example.com".to_string(),
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Profile ada@example.com: FOREIGN KEY constraint failed"
        );
    }

    #[tokio::test]
    async fn test_rejected_rows_do_not_stop_table() {
        let store = Arc::new(RecordingStore::default());
        let importer = Importer::new(store.clone(), ImportOptions::default());
        let payload = ImportPayload::from_tables(vec![(
            ImportTable::UserRoles,
            vec![json!({"id": "r1"}), json!({"id": "bad-2"}), json!({"id": "r3"})],
        )]);

        let report = importer.run(&payload).await.unwrap();

        let outcome = report.results.get(ImportTable::UserRoles).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(
            outcome.errors,
            vec!["User role bad-2: rejected by test store".to_string()]
        );
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_aborts_remaining_tables() {
        let store = Arc::new(RecordingStore::default());
        let importer = Importer::new(store.clone(), ImportOptions::default());
        let payload = ImportPayload::from_tables(vec![
            (ImportTable::Permissions, vec![json!({"id": "down"})]),
            (ImportTable::Profiles, vec![json!({"id": "u1"})]),
        ]);

        let result = importer.run(&payload).await;

        assert!(matches!(result, Err(ImportError::Internal(_))));
        let calls = store.calls.lock().unwrap();
        assert!(calls.iter().all(|(t, _)| *t == ImportTable::Permissions));
    }

    #[tokio::test]
    async fn test_import_runs_on_spawned_task() {
        let importer = Importer::new(Arc::new(RecordingStore::default()), ImportOptions::default());
        let payload = ImportPayload::from_tables(vec![(
            ImportTable::Permissions,
            vec![json!({"id": "p1"}), json!({"id": "p2"})],
        )]);

        // Handlers run on a multi-threaded runtime, so the import future must be Send
        let report = tokio::spawn(async move { importer.run(&payload).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.summary.permissions, 2);
    }

    #[tokio::test]
    async fn test_concurrent_rows_reported_in_input_order() {
        let store = Arc::new(RecordingStore::default());
        let importer = Importer::new(
            store,
            ImportOptions {
                row_concurrency: 4,
                ..Default::default()
            },
        );
        let rows: Vec<Value> = (0..10)
            .map(|i| {
                let id = if i % 3 == 0 { format!("bad-{}", i) } else { format!("ok-{}", i) };
                json!({"id": id})
            })
            .collect();
        let payload = ImportPayload::from_tables(vec![(ImportTable::UserAchievements, rows)]);

        let report = importer.run(&payload).await.unwrap();

        let outcome = report.results.get(ImportTable::UserAchievements).unwrap();
        assert_eq!(outcome.inserted, 6);
        let keys: Vec<_> = outcome
            .errors
            .iter()
            .map(|e| e.split(':').next().unwrap().to_string())
            .collect();
        assert_eq!(
            keys,
            vec![
                "User achievement bad-0",
                "User achievement bad-3",
                "User achievement bad-6",
                "User achievement bad-9",
            ]
        );
    }
}
