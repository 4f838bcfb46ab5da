//! Role gate middleware
//!
//! The identity provider in front of this service authenticates the caller
//! and forwards its role in a trusted header (`auth.role_header`). Only the
//! roles listed in `auth.allowed_roles` reach the feed; an empty list
//! disables the gate.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Role check applied to protected routes
///
/// `/health` does not use this middleware.
pub async fn role_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = &state.config.auth;
    if auth.is_disabled() {
        return Ok(next.run(request).await);
    }

    let role = request
        .headers()
        .get(auth.role_header.as_str())
        .ok_or(AuthError::MissingRole)?
        .to_str()
        .map(str::trim)
        .map_err(|_| AuthError::RoleNotAllowed("<non-ascii>".to_string()))?;

    if role.is_empty() {
        return Err(AuthError::MissingRole);
    }

    if !auth.permits(role) {
        warn!(role = %role, path = %request.uri().path(), "Rejected caller role");
        return Err(AuthError::RoleNotAllowed(role.to_string()));
    }

    Ok(next.run(request).await)
}

/// Role gate failures
#[derive(Debug)]
pub enum AuthError {
    /// No role forwarded by the identity provider
    MissingRole,
    RoleNotAllowed(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingRole => (
                StatusCode::UNAUTHORIZED,
                "Missing caller role".to_string(),
            ),
            AuthError::RoleNotAllowed(role) => (
                StatusCode::FORBIDDEN,
                format!("Role '{}' may not access the feed", role),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
