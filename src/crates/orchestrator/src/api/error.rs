//! API error types and HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use review_core::ReviewError;
use serde::Serialize;
use thiserror::Error;

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    /// Populated for `decisions_incomplete`: the diff ids still undecided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors an endpoint can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Quota exhausted for {0}")]
    QuotaExhausted(String),

    #[error("Decisions incomplete")]
    DecisionsIncomplete { missing: Vec<String> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::QuotaExhausted(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::DecisionsIncomplete { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::QuotaExhausted(_) => "QUOTA_EXHAUSTED",
            ApiError::DecisionsIncomplete { .. } => "DECISIONS_INCOMPLETE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Validation(_) => "ValidationError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::QuotaExhausted(_) => "QuotaExhausted",
            ApiError::DecisionsIncomplete { .. } => "DecisionsIncomplete",
            ApiError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let missing = match &self {
            ApiError::DecisionsIncomplete { missing } => Some(missing.clone()),
            _ => None,
        };
        let message = match &self {
            ApiError::DecisionsIncomplete { missing } => {
                format!("decisions missing for: {}", missing.join(", "))
            }
            other => other.to_string(),
        };
        let body = ApiErrorResponse {
            error: self.error_type().to_string(),
            message,
            code: self.code().to_string(),
            missing,
        };
        tracing::error!(status = %status, code = body.code, "API error: {}", body.message);
        (status, Json(body)).into_response()
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotFound(msg) => ApiError::NotFound(msg),
            ReviewError::Validation(msg) => ApiError::Validation(msg),
            ReviewError::Conflict(msg) => ApiError::Conflict(msg),
            ReviewError::QuotaExhausted(user) => ApiError::QuotaExhausted(user),
            ReviewError::DecisionsIncomplete { missing } => {
                ApiError::DecisionsIncomplete { missing }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::QuotaExhausted("u".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ApiError::DecisionsIncomplete { missing: vec![] }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn review_error_mapping() {
        let err: ApiError = ReviewError::DecisionsIncomplete {
            missing: vec!["d2".to_string()],
        }
        .into();
        match &err {
            ApiError::DecisionsIncomplete { missing } => assert_eq!(missing, &vec!["d2".to_string()]),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(err.code(), "DECISIONS_INCOMPLETE");

        let err: ApiError = ReviewError::ProviderUnavailable("all down".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
