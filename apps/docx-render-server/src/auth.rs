//! Shared-secret authentication for the render endpoint

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ServerError;
use crate::AppState;

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` does not match the configured key.
/// Without a configured key every request passes.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(expected) = state.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .map(|value| value.as_bytes())
            .unwrap_or_default();

        if !bool::from(provided.ct_eq(expected.as_bytes())) {
            warn!("Rejected {} {}: missing or invalid API key", request.method(), request.uri());
            return Err(ServerError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}
