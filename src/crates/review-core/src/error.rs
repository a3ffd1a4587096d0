//! Error taxonomy for the review engine.

use thiserror::Error;

/// Result type for review operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors observable from the review engine.
///
/// Per-call failures are caught at the nearest component boundary and
/// transformed into the closest kind here. Model and skill failures are
/// isolated inside the agent loop and never surface as errors; only
/// exhausted providers, oversize or broken streams, and explicit
/// cancellation move a task to `failed`.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Bad input: schema mismatch, missing field, malformed payload.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested task, skill, clause, or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation conflicts with the task's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The user has no review credits left.
    #[error("Quota exhausted for user {0}")]
    QuotaExhausted(String),

    /// Every configured model provider failed.
    #[error("All model providers unavailable: {0}")]
    ProviderUnavailable(String),

    /// A model stream failed after delivery had started.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// A model stream exceeded the configured byte cap.
    #[error("Stream exceeded {limit} bytes")]
    StreamTooLarge { limit: usize },

    /// Resume was attempted with decisions missing for some pending diffs.
    #[error("Decisions incomplete, missing: {}", .missing.join(", "))]
    DecisionsIncomplete { missing: Vec<String> },

    /// Diff regeneration after rejection hit the bounded retry cap.
    #[error("Regeneration rounds exhausted for clause {clause_id}")]
    RegenerationExhausted { clause_id: String },

    /// The task was cancelled from outside.
    #[error("Task cancelled")]
    Cancelled,

    /// State could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A checkpoint write failed. Callers log and continue.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Anything unexpected.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ReviewError {
    fn from(err: serde_json::Error) -> Self {
        ReviewError::Serialization(err.to_string())
    }
}

impl From<review_checkpoint::CheckpointError> for ReviewError {
    fn from(err: review_checkpoint::CheckpointError) -> Self {
        ReviewError::Checkpoint(err.to_string())
    }
}

impl ReviewError {
    /// Short machine-readable kind, used in error events and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewError::Validation(_) => "validation_error",
            ReviewError::NotFound(_) => "not_found",
            ReviewError::Conflict(_) => "conflict",
            ReviewError::QuotaExhausted(_) => "quota_exhausted",
            ReviewError::ProviderUnavailable(_) => "provider_unavailable",
            ReviewError::StreamInterrupted(_) => "stream_interrupted",
            ReviewError::StreamTooLarge { .. } => "stream_too_large",
            ReviewError::DecisionsIncomplete { .. } => "decisions_incomplete",
            ReviewError::RegenerationExhausted { .. } => "regeneration_exhausted",
            ReviewError::Cancelled => "cancelled",
            ReviewError::Serialization(_) => "serialization_error",
            ReviewError::Checkpoint(_) => "checkpoint_error",
            ReviewError::Internal(_) => "internal_error",
        }
    }

    /// True when the error should move the owning task to `failed`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReviewError::ProviderUnavailable(_)
                | ReviewError::StreamInterrupted(_)
                | ReviewError::StreamTooLarge { .. }
                | ReviewError::Cancelled
        )
    }
}
