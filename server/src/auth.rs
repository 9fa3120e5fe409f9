use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub token_type: TokenKind,
    /// Random id; revocation is recorded against it.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| ApiError::Unauthorized("Invalid token subject.".to_string()))
    }
}

const DEFAULT_REFRESH_TTL_HOURS: i64 = 24 * 7;

/// Signing material, token lifetimes and password hashing cost, built once at start-up.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl AuthKeys {
    pub fn new(secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::hours(token_ttl_hours),
            refresh_ttl: Duration::hours(DEFAULT_REFRESH_TTL_HOURS),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Keys from `secret`, or a random per-process secret when none is configured.
    pub fn from_optional_secret(secret: Option<&str>, token_ttl_hours: i64) -> Self {
        match secret {
            Some(secret) => Self::new(secret, token_ttl_hours),
            None => {
                tracing::warn!("JWT_SECRET not set; issued tokens will not survive a restart");
                Self::new(&random_string(48), token_ttl_hours)
            }
        }
    }

    pub fn with_refresh_ttl_hours(mut self, hours: i64) -> Self {
        self.refresh_ttl = Duration::hours(hours);
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn encode_claims(
        &self,
        user_id: i64,
        username: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            token_type: kind,
            jti: random_string(32),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
    }

    /// Short-lived token sent as `Authorization: Bearer`.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, ApiError> {
        self.encode_claims(user_id, username, TokenKind::Access, self.access_ttl)
    }

    /// Long-lived token exchanged at `/api/token/refresh` and revoked at `/api/logout`.
    pub fn issue_refresh(&self, user_id: i64, username: &str) -> Result<String, ApiError> {
        self.encode_claims(user_id, username, TokenKind::Refresh, self.refresh_ttl)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token.".to_string()))
    }

    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, ApiError> {
        let claims = self.verify(token)?;
        if claims.token_type != kind {
            return Err(ApiError::Unauthorized("Token has wrong type.".to_string()));
        }
        Ok(claims)
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// The authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
            })?;

        let claims = state.auth.verify_kind(token, TokenKind::Access)?;
        Ok(AuthUser {
            id: claims.user_id()?,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = AuthKeys::new("test-secret-key-for-testing-purposes-only", 1);
        let token = keys.issue(42, "alice").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn access_and_refresh_tokens_are_not_interchangeable() {
        let keys = AuthKeys::new("secret", 1);
        let access = keys.issue(7, "carol").unwrap();
        let refresh = keys.issue_refresh(7, "carol").unwrap();

        assert!(keys.verify_kind(&access, TokenKind::Access).is_ok());
        assert!(keys.verify_kind(&access, TokenKind::Refresh).is_err());
        let claims = keys.verify_kind(&refresh, TokenKind::Refresh).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert!(keys.verify_kind(&refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn every_token_gets_its_own_id() {
        let keys = AuthKeys::new("secret", 1);
        let a = keys.verify(&keys.issue_refresh(1, "dan").unwrap()).unwrap();
        let b = keys.verify(&keys.issue_refresh(1, "dan").unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let ours = AuthKeys::new("secret-one", 1);
        let theirs = AuthKeys::new("secret-two", 1);
        let token = theirs.issue(1, "mallory").unwrap();
        assert!(matches!(ours.verify(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = AuthKeys::new("secret", -2);
        let token = keys.issue(1, "bob").unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = AuthKeys::from_optional_secret(None, 1);
        assert!(keys.verify("invalid.token.here").is_err());
    }
}
