//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and logout.

use crate::web::{
    errors::{ErrorDetail, HttpError},
    state::AppState,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use attendance_core::{ports::PortError, User};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserProfile {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Usernames become part of storage keys, so only a conservative alphabet is allowed.
fn validate_username(username: &str) -> Result<(), HttpError> {
    let valid = !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(HttpError::bad_request(
            "Username must be 1-64 characters of letters, digits, '.', '_' or '-'",
        ))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn issue_token(state: &AppState, username: &str) -> Result<String, HttpError> {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(state.config.token_ttl_days);
    state
        .accounts
        .create_auth_token(&token, username, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth token: {:?}", e);
            HttpError::internal("Failed to create session")
        })?;
    Ok(token)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /register - Create a new account and sign it in
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorDetail),
        (status = 409, description = "Username already taken", body = ErrorDetail),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let username = req.username.trim().to_string();
    validate_username(&username)?;
    if req.password.is_empty() {
        return Err(HttpError::bad_request("Password is required"));
    }
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(HttpError::bad_request("Full name is required"));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            HttpError::internal("Failed to hash password")
        })?
        .to_string();

    // 2. Create the account
    let user = User {
        username,
        full_name,
        email: req.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        created_at: Utc::now(),
    };
    let user = state.accounts.create_user(user, &password_hash).await?;

    // 3. Sign the new user in
    let token = issue_token(&state, &user.username).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// POST /login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorDetail),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let invalid = || HttpError::unauthorized("Invalid username or password");

    // 1. Look up the account
    let credentials = match state.accounts.get_credentials(req.username.trim()).await {
        Ok(credentials) => credentials,
        Err(PortError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&credentials.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        HttpError::internal("Authentication error")
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    // 3. Issue a token
    let token = issue_token(&state, &credentials.user.username).await?;
    info!(username = %credentials.user.username, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: credentials.user.into(),
    }))
}

/// POST /logout - Revoke the presented bearer token
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Not authenticated", body = ErrorDetail)
    ),
    security(("bearer" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let token = bearer_token(&headers).ok_or_else(|| HttpError::unauthorized("Not authenticated"))?;
    state.accounts.delete_auth_token(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
