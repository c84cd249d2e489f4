//! HTTP API handlers for examprep-import

pub mod auth;
pub mod health;
pub mod import;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use import::{import_routes, IMPORT_PATH};
