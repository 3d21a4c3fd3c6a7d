//! crates/attendance_core/src/error.rs
//!
//! Error taxonomy for tracker operations.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A required field is missing or out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An upstream call failed in transport or returned a non-success status.
    #[error("Network error: {0}")]
    Network(String),

    /// A document is malformed or lacks required fields.
    #[error("Format error: {0}")]
    Format(String),

    #[error("Storage error: {0}")]
    Port(#[from] PortError),
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Format(e.to_string())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
