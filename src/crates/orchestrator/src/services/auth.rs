//! Bearer token verification against a JWK set.
//!
//! Tokens are RS256 JWTs; the signing keys are fetched from the identity
//! provider's JWKS endpoint over HTTPS and cached for a bounded time. The
//! authenticated user id is the token's subject claim. With
//! `AUTH_DISABLED` every request resolves to a fixed development user.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How long a fetched JWK set stays valid.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// User id handed out when auth is disabled.
pub const DEV_USER_ID: &str = "dev-user";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Key lookup failed: {0}")]
    KeyLookup(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

struct CachedKeys {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Verifies bearer tokens and resolves them to user ids.
pub struct AuthVerifier {
    jwks_url: String,
    disabled: bool,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl AuthVerifier {
    pub fn new(jwks_url: impl Into<String>, disabled: bool) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            disabled,
            client: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    /// Resolve an `Authorization` header value to a user id.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        if self.disabled {
            return Ok(DEV_USER_ID.to_string());
        }
        let token = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = 60;

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        debug!(user_id = %data.claims.sub, "token verified");
        Ok(data.claims.sub)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.key_from_cache(kid) {
            return Ok(key);
        }
        self.refresh_jwks().await?;
        self.key_from_cache(kid)
            .ok_or_else(|| AuthError::KeyLookup(format!("no key with id {kid}")))
    }

    fn key_from_cache(&self, kid: &str) -> Option<DecodingKey> {
        let cache = self.cache.read();
        let cached = cache.as_ref()?;
        if cached.fetched_at.elapsed() > JWKS_CACHE_TTL {
            return None;
        }
        let jwk = cached.jwks.find(kid)?;
        DecodingKey::from_jwk(jwk).ok()
    }

    async fn refresh_jwks(&self) -> Result<(), AuthError> {
        if self.jwks_url.is_empty() {
            return Err(AuthError::KeyLookup("no JWKS endpoint configured".to_string()));
        }
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyLookup(e.to_string()))?
            .json()
            .await
            .map_err(|e| {
                warn!(%e, "JWKS endpoint returned an unreadable body");
                AuthError::KeyLookup(e.to_string())
            })?;
        *self.cache.write() = Some(CachedKeys {
            jwks,
            fetched_at: Instant::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mode_resolves_to_dev_user() {
        let verifier = AuthVerifier::new("", true);
        assert_eq!(verifier.verify(None).await.unwrap(), DEV_USER_ID);
        assert_eq!(
            verifier.verify(Some("Bearer whatever")).await.unwrap(),
            DEV_USER_ID
        );
    }

    #[tokio::test]
    async fn missing_token_rejected() {
        let verifier = AuthVerifier::new("https://example.invalid/jwks", false);
        assert!(matches!(
            verifier.verify(None).await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            verifier.verify(Some("Basic abc")).await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            verifier.verify(Some("Bearer ")).await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let verifier = AuthVerifier::new("https://example.invalid/jwks", false);
        let err = verifier.verify(Some("Bearer not.a.jwt")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
