//! Error types for structure parsing.

use thiserror::Error;

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while parsing document structure.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The configured clause pattern is not a valid regular expression.
    #[error("Invalid clause pattern: {0}")]
    InvalidPattern(String),

    /// A cross-reference pattern failed to compile.
    #[error("Invalid cross-reference pattern: {0}")]
    InvalidReferencePattern(String),

    /// The document is empty or contains no usable text.
    #[error("Empty document")]
    EmptyDocument,
}

impl From<regex::Error> for ParserError {
    fn from(err: regex::Error) -> Self {
        ParserError::InvalidPattern(err.to_string())
    }
}
