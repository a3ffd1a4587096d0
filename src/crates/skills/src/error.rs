//! Skill error classification.

use thiserror::Error;

/// Classified failure of a skill invocation. The kind string travels in
/// [`SkillResult::error`](review_core::SkillResult) summaries and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillErrorKind {
    /// The skill id or remote workflow does not exist.
    NotFound,
    /// The invocation exceeded its time budget, or remote polling never
    /// reached a terminal state.
    Timeout,
    /// The remote engine reported a terminal failure.
    BackendError,
    /// Input or output failed schema validation.
    SchemaViolation,
    /// Anything else.
    Internal,
}

impl SkillErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillErrorKind::NotFound => "not_found",
            SkillErrorKind::Timeout => "timeout",
            SkillErrorKind::BackendError => "backend_error",
            SkillErrorKind::SchemaViolation => "schema_violation",
            SkillErrorKind::Internal => "internal",
        }
    }
}

/// A classified skill failure.
#[derive(Debug, Error)]
#[error("{}: {}", .kind.as_str(), .message)]
pub struct SkillError {
    pub kind: SkillErrorKind,
    pub message: String,
}

impl SkillError {
    pub fn new(kind: SkillErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SkillErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SkillErrorKind::Timeout, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(SkillErrorKind::BackendError, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(SkillErrorKind::SchemaViolation, message)
    }
}
