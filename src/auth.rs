//! Shared-secret gate for the API surface.
//!
//! Operators call this service from scripts and spreadsheet buttons, so the
//! secret is accepted either as a `key` query parameter or an `X-App-Key`
//! header. No users, no tokens: one secret, compared against configuration.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::ServiceError;
use crate::AppState;

/// Header carrying the shared secret, for callers that can set headers.
pub const APP_KEY_HEADER: &str = "x-app-key";

fn supplied_key(request: &Request) -> Option<String> {
    if let Some(query) = request.uri().query() {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if name == "key" {
                return Some(value.into_owned());
            }
        }
    }
    request
        .headers()
        .get(APP_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Rejects any request whose supplied secret does not match configuration.
pub async fn require_shared_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    match supplied_key(&request) {
        Some(key) if key == state.config.shared_key => Ok(next.run(request).await),
        Some(_) => Err(ServiceError::Unauthorized("key mismatch".to_string())),
        None => Err(ServiceError::Unauthorized(
            "missing key parameter or X-App-Key header".to_string(),
        )),
    }
}
