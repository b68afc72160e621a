//! JWT token generation and validation
//!
//! HS256 with a symmetric secret. Expiry is checked against the injected
//! clock rather than inside `jsonwebtoken`, so a token is valid iff
//! `now < exp`.

use super::claims::Claims;
use crate::{clock::Clock, config::AppConfig, error::AppError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const ALGORITHM: Algorithm = Algorithm::HS256;
const MIN_SECRET_LEN: usize = 32;

/// Why a presented token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token was signed with an unexpected algorithm")]
    UnexpectedAlgorithm,
    #[error("token has expired")]
    Expired,
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Unauthorized(format!("Invalid token: {}", e))
    }
}

/// Identity the token is issued for
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: Claims,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    remember_me_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtService {
    pub fn new(
        secret: &str,
        token_ttl: Duration,
        remember_me_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        // HS256 wants at least 256 bits of key material
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "JWT secret too short (min {} chars)",
                MIN_SECRET_LEN
            )));
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl,
            remember_me_ttl,
            clock,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let security = &config.security;
        Self::new(
            security.jwt_secret.expose_secret(),
            Duration::seconds(security.token_ttl_secs as i64),
            Duration::seconds(security.remember_me_ttl_secs as i64),
            clock,
        )
    }

    pub fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.remember_me_ttl
        } else {
            self.token_ttl
        }
    }

    /// Sign a token for `subject` valid for `ttl` from now
    pub fn issue(&self, subject: &TokenSubject, ttl: Duration) -> Result<IssuedToken, AppError> {
        let now = self.clock.now();
        let expires_at = now + ttl;

        let claims = Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })?;

        // Round to what the token actually carries
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);

        Ok(IssuedToken {
            token,
            expires_at,
            claims,
        })
    }

    /// Check signature, algorithm and expiry; return the normalized claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        TokenError::UnexpectedAlgorithm
                    }
                    _ => TokenError::Malformed,
                };
                tracing::debug!(error = ?e, reason = %reason, "Token validation failed");
                reason
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const SECRET: &str = "unit-test-secret-key-with-at-least-32-chars";

    fn service(clock: Arc<ManualClock>) -> JwtService {
        JwtService::new(SECRET, Duration::hours(24), Duration::days(7), clock).unwrap()
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            email: "ana@x.com".to_string(),
            roles: vec!["STUDENT".to_string()],
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        assert!(JwtService::new("short", Duration::hours(1), Duration::hours(1), clock).is_err());
    }

    #[test]
    fn test_issue_and_verify() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = service(clock);
        let subject = subject();

        let issued = jwt.issue(&subject, jwt.ttl_for(false)).unwrap();
        let claims = jwt.verify(&issued.token).unwrap();

        assert_eq!(claims.sub, subject.user_id.to_string());
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.roles, vec!["STUDENT"]);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_remember_me_extends_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = service(clock);
        assert_eq!(jwt.ttl_for(true), Duration::days(7));
        assert_eq!(jwt.ttl_for(false), Duration::hours(24));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = service(clock);
        assert_eq!(jwt.verify("not.a.token"), Err(TokenError::Malformed));
        assert_eq!(jwt.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_token_expires_at_boundary() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = service(clock.clone());
        let issued = jwt.issue(&subject(), Duration::seconds(60)).unwrap();

        clock.advance(Duration::seconds(59));
        assert!(jwt.verify(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(jwt.verify(&issued.token), Err(TokenError::Expired));
    }
}
