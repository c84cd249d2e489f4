//! Service-key authentication for the import endpoint
//!
//! The import writes with elevated privileges, so when a service key is
//! configured every request must present it, either as an `apikey` header
//! or as `Authorization: Bearer <key>`. No configured key disables the
//! check entirely.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{ApiError, AppState};

/// Header carrying the service key
pub const API_KEY_HEADER: &str = "apikey";

/// Authentication middleware
///
/// Returns 401 Unauthorized when a key is configured and the request does
/// not carry it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.service_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let verdict = presented_key(request.headers()).map(|key| keys_match(key, expected));
    match verdict {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            warn!("Rejected request to {}: invalid service key", request.uri().path());
            Err(ApiError::Unauthorized("Invalid service key".to_string()))
        }
        None => Err(ApiError::Unauthorized("Missing service key".to_string())),
    }
}

/// Key from `apikey`, falling back to a bearer token
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare fixed-size digests rather than the raw keys
fn keys_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}
