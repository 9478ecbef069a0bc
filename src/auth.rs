//! Bearer token protection for the MCP endpoints
//!
//! Enabled only when `HTTP_API_KEY` is set and `DISABLE_AUTH` is not `true`.
//! Health routes are mounted outside this layer.

use crate::config::AuthConfig;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Body of a 401 response
#[derive(Debug, Serialize)]
pub struct AuthError {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

impl AuthError {
    fn unauthorized(message: &str) -> Self {
        Self {
            error: "Unauthorized".to_string(),
            message: message.to_string(),
        }
    }
}

/// Validate the `Authorization` header against the configured key
pub fn check_bearer(auth_config: &AuthConfig, headers: &HeaderMap) -> Result<(), AuthError> {
    let expected = match (&auth_config.api_key, auth_config.enabled) {
        (Some(key), true) => key,
        _ => return Ok(()),
    };

    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AuthError::unauthorized("Invalid Authorization header format"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::unauthorized("Authorization header must use Bearer token"))?;

    if token != expected {
        tracing::debug!("Invalid API key provided (length: {})", token.len());
        return Err(AuthError::unauthorized("Invalid API key"));
    }
    Ok(())
}

/// Bearer token authentication middleware
pub async fn bearer_auth_middleware(
    State(auth_config): State<AuthConfig>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = check_bearer(&auth_config, &headers) {
        tracing::debug!("Rejected {} {}: {}", request.method(), request.uri(), e.message);
        return Err(e);
    }
    Ok(next.run(request).await)
}
