use axum::http::HeaderMap;
use tracing::warn;

use crate::error::ApiError;

/// Check `Authorization: Bearer <token>` against the configured operator
/// token. With no token configured every request passes.
pub fn require_operator(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| deny("missing Authorization header"))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| deny("Authorization header must use Bearer scheme"))?;

    if token == expected {
        Ok(())
    } else {
        Err(deny("bearer token mismatch"))
    }
}

fn deny(reason: &str) -> ApiError {
    warn!(reason, "operator authentication failed");
    ApiError::Unauthorized(reason.to_string())
}
