//! RBAC data import endpoint
//!
//! `POST /import-rbac-data` with `{ "data": { "tables": { ... } } }`.
//! Answers 200 with the import report even when some rows failed; 400 when
//! the payload is malformed; 500 when the store fails outright.

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use tracing::info;

use crate::importer::ImportReport;
use crate::{ApiResult, AppState};

/// Route path of the import endpoint
pub const IMPORT_PATH: &str = "/import-rbac-data";

/// POST /import-rbac-data
///
/// The body is taken as raw bytes so that unparsable JSON is reported with
/// the same validation error as a structurally invalid payload.
pub async fn import_rbac_data(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ImportReport>> {
    let payload = state.importer.parse(&body)?;
    info!(
        "Import requested: {} tables, {} rows",
        payload.tables().count(),
        payload.row_count()
    );

    let report = state.importer.run(&payload).await?;
    info!(
        "Import finished: {} rows upserted, {} rows failed",
        report.total_inserted(),
        report.total_errors()
    );

    Ok(Json(report))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new().route(IMPORT_PATH, post(import_rbac_data))
}
