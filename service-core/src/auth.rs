//! Bearer-token authentication shared by the marketplace services.
//!
//! Tokens are HS256 JWTs issued by the identity provider. Claims carry the
//! user id, email, and whether the email address has been confirmed;
//! endpoints that move money additionally require a confirmed email.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: String,
    /// Whether the identity provider has confirmed the email address
    #[serde(default)]
    pub email_verified: bool,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Validates access tokens against the shared signing secret.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        }
    }

    /// Validate a token and return its claims.
    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Middleware to require authentication.
///
/// On success the claims are stored in request extensions for the
/// [`AuthUser`] extractor.
pub async fn auth_middleware<S>(
    State(state): State<S>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: AsRef<JwtService> + Send + Sync,
{
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state
        .as_ref()
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor to easily get claims in handlers.
pub struct AuthUser(pub AccessTokenClaims);

impl AuthUser {
    /// Reject callers whose email address the identity provider has not
    /// confirmed yet.
    pub fn require_verified_email(&self) -> Result<(), AppError> {
        if !self.0.email_verified {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Email address must be confirmed before this operation"
            )));
        }
        Ok(())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessTokenClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn issue(secret: &str, email_verified: bool, exp_offset: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: "user-1".to_string(),
            email: "buyer@example.com".to_string(),
            email_verified,
            exp: now + exp_offset,
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode token")
    }

    #[test]
    fn valid_token_round_trips() {
        let secret = Secret::new("test-secret".to_string());
        let service = JwtService::new(&secret);
        let token = issue("test-secret", true, 3600);

        let claims = service.validate_access_token(&token).expect("valid token");
        assert_eq!(claims.sub, "user-1");
        assert!(claims.email_verified);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let secret = Secret::new("test-secret".to_string());
        let service = JwtService::new(&secret);
        let token = issue("other-secret", true, 3600);

        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = Secret::new("test-secret".to_string());
        let service = JwtService::new(&secret);
        let token = issue("test-secret", true, -3600);

        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn unverified_email_is_forbidden() {
        let user = AuthUser(AccessTokenClaims {
            sub: "user-1".to_string(),
            email: "buyer@example.com".to_string(),
            email_verified: false,
            exp: 0,
            iat: 0,
            jti: "jti".to_string(),
        });
        assert!(user.require_verified_email().is_err());
    }
}
