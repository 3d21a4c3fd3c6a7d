//! services/api/src/web/errors.rs
//!
//! Maps tracker and port failures onto HTTP responses with a `{"detail": ...}` body.

use attendance_core::{ports::PortError, TrackerError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub detail: String,
}

impl HttpError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorDetail { detail: self.detail })).into_response()
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, what),
            PortError::Conflict(what) => Self::new(StatusCode::CONFLICT, what),
            PortError::Unauthorized => Self::unauthorized("Not authenticated"),
            PortError::Unexpected(msg) => {
                error!("Port failure: {}", msg);
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<TrackerError> for HttpError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Validation(msg) | TrackerError::Format(msg) => Self::bad_request(msg),
            TrackerError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            TrackerError::Network(msg) => {
                error!("Upstream failure: {}", msg);
                Self::new(StatusCode::BAD_GATEWAY, msg)
            }
            TrackerError::Port(port) => port.into(),
        }
    }
}
