//! crates/attendance_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or LLM APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExtractedCalendarResult, ExtractedTimetableResult, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// String-keyed, string-valued persistence. Values are serialized JSON blobs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Fails with `PortError::Conflict` when the username is taken.
    async fn create_user(&self, user: User, password_hash: &str) -> PortResult<User>;

    async fn get_credentials(&self, username: &str) -> PortResult<UserCredentials>;

    async fn create_auth_token(
        &self,
        token: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a token to its user. Expired or unknown tokens yield `Unauthorized`.
    async fn validate_auth_token(&self, token: &str) -> PortResult<User>;

    async fn delete_auth_token(&self, token: &str) -> PortResult<()>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Turns an uploaded document into plain text.
    async fn extract_text(&self, file_name: &str, data: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait DocumentAnalysisService: Send + Sync {
    async fn analyze_calendar(&self, text: &str) -> PortResult<ExtractedCalendarResult>;

    async fn analyze_timetable(&self, text: &str) -> PortResult<ExtractedTimetableResult>;
}
