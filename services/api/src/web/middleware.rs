//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::{auth::bearer_token, errors::HttpError, state::AppState};

/// Middleware that validates the bearer token and resolves it to a `User`.
///
/// If valid, inserts the user into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| HttpError::unauthorized("Not authenticated"))?
        .to_string();

    let user = state.accounts.validate_auth_token(&token).await.map_err(|e| {
        debug!("Rejected bearer token: {:?}", e);
        HttpError::unauthorized("Invalid or expired token")
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
