//! examprep-import library - RBAC bulk import service
//!
//! Applies permissions, role grants, user roles, achievements and profiles
//! to the exam-prep database in dependency order, isolating failures per
//! row. Exposed over HTTP and through the `apply` CLI command.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use examprep_common::config::DEFAULT_MAX_BODY_BYTES;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod importer;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use crate::importer::{ImportOptions, Importer};
use crate::store::RowStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Importer bound to the row store
    pub importer: Importer,
    /// Row store, also probed by the health endpoint
    pub store: Arc<dyn RowStore>,
    /// Service key required for imports (None disables auth)
    pub service_key: Option<String>,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn RowStore>, options: ImportOptions) -> Self {
        Self {
            importer: Importer::new(store.clone(), options),
            store,
            service_key: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            startup_time: Utc::now(),
        }
    }

    pub fn with_service_key(mut self, service_key: Option<String>) -> Self {
        self.service_key = service_key;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Build application router
///
/// The import route sits behind service-key auth; `/health` does not.
/// CORS is outermost so preflight requests are answered before auth runs.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = api::import_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        api::auth_middleware,
    ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Permissive CORS matching what browser clients of the import function send
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}
