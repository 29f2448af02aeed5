//! Bearer-token authentication.
//!
//! Tokens are minted by the identity provider; this service only verifies
//! them (HS256 against `jwt_secret`) and exposes the caller as [`AuthUser`].

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::AppConfig, errors::ServiceError, AppState};

/// JWT claims accepted by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,               // Subject (user ID)
    pub name: Option<String>,      // Display name
    #[serde(default)]
    pub roles: Vec<String>,        // User's roles
    pub exp: i64,                  // Expiration time
    #[serde(default)]
    pub iat: Option<i64>,          // Issued at time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,       // Issuer
}

impl Claims {
    pub fn new(sub: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            name: None,
            roles: Vec::new(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            iss: None,
        }
    }

    /// Signs the claims with HS256.
    pub fn sign(&self, secret: &str) -> Result<String, ServiceError> {
        encode(
            &Header::new(Algorithm::HS256),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {}", e)))
    }
}

/// The caller behind a verified token. `user_id` is what lands in
/// `created_by`, `cancelled_by` and `approved_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            roles: claims.roles,
        }
    }
}

/// Decodes and validates a token against the configured secret and issuer.
pub fn validate_token(token: &str, config: &AppConfig) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(issuer) = config.jwt_issuer.as_deref() {
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
    }

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ServiceError::Unauthorized("token expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_) => {
            ServiceError::Unauthorized("token issuer not accepted".to_string())
        }
        _ => ServiceError::Unauthorized("invalid token".to_string()),
    })?
    .claims;

    if claims.sub.trim().is_empty() {
        return Err(ServiceError::Unauthorized("token has no subject".to_string()));
    }

    Ok(claims)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(parts).ok_or_else(|| {
            ServiceError::Unauthorized("missing bearer token".to_string())
        })?;
        let user = AuthUser::from(validate_token(token, &state.config)?);
        debug!(user_id = %user.user_id, "authenticated request");

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "unit-test-secret-0123456789abcdef0123456789";

    fn config() -> AppConfig {
        AppConfig::new("sqlite::memory:".into(), SECRET.into(), "test".into())
    }

    #[test]
    fn valid_token_round_trips() {
        let mut claims = Claims::new("user-1", Duration::minutes(5));
        claims.roles = vec!["dispatcher".into()];
        let token = claims.sign(SECRET).unwrap();

        let user = AuthUser::from(validate_token(&token, &config()).unwrap());
        assert_eq!(user.user_id, "user-1");
        assert!(user.has_role("dispatcher"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = Claims::new("user-1", Duration::minutes(-10))
            .sign(SECRET)
            .unwrap();
        assert_matches!(
            validate_token(&token, &config()),
            Err(ServiceError::Unauthorized(msg)) if msg == "token expired"
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = Claims::new("user-1", Duration::minutes(5))
            .sign("another-secret-that-is-long-enough-too")
            .unwrap();
        assert_matches!(
            validate_token(&token, &config()),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn issuer_is_enforced_when_configured() {
        let mut cfg = config();
        cfg.jwt_issuer = Some("erp-auth".into());

        let token = Claims::new("user-1", Duration::minutes(5))
            .sign(SECRET)
            .unwrap();
        assert_matches!(
            validate_token(&token, &cfg),
            Err(ServiceError::Unauthorized(msg)) if msg == "token issuer not accepted"
        );

        let mut claims = Claims::new("user-1", Duration::minutes(5));
        claims.iss = Some("someone-else".into());
        let token = claims.sign(SECRET).unwrap();
        assert_matches!(
            validate_token(&token, &cfg),
            Err(ServiceError::Unauthorized(msg)) if msg == "token issuer not accepted"
        );

        let mut claims = Claims::new("user-1", Duration::minutes(5));
        claims.iss = Some("erp-auth".into());
        let token = claims.sign(SECRET).unwrap();
        assert!(validate_token(&token, &cfg).is_ok());
    }
}
