//! Error types for session persistence.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur when persisting or loading sessions.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The requested session does not exist.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Graph state could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backing store rejected the operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A write carried a revision at or below the stored one.
    #[error("Stale revision for {task_id}: incoming {incoming}, stored {stored}")]
    StaleRevision {
        task_id: String,
        incoming: u64,
        stored: u64,
    },
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}
