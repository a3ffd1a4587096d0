//! Request extractors.

use crate::api::error::ApiError;
use crate::api::routes::AppState;
use crate::services::auth::AuthError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated user id, resolved from the bearer token.
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match state.auth.verify(header).await {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(AuthError::MissingToken) => {
                Err(ApiError::Unauthorized("missing bearer token".to_string()))
            }
            Err(err) => Err(ApiError::Unauthorized(err.to_string())),
        }
    }
}
