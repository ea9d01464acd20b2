use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credentials::VerifiedIdentity;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub refresh_window_seconds: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds: 600,
            refresh_ttl_seconds: 300,
            refresh_window_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and checks HS256 bearer tokens signed with the process secret.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Result<Self> {
        if config.secret.trim().is_empty() {
            return Err(anyhow!("JWT secret must not be empty"));
        }
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn issue(&self, identity: &VerifiedIdentity) -> ServiceResult<IssuedToken> {
        let now = Utc::now().timestamp();
        self.issue_with_expiry(&identity.username, now, now + self.config.ttl_seconds)
    }

    pub fn issue_with_expiry(&self, username: &str, iat: i64, exp: i64) -> ServiceResult<IssuedToken> {
        let claims = TokenClaims {
            username: username.to_string(),
            iat,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| ServiceError::Internal(format!("Failed to sign token: {err}")))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| ServiceError::Internal(format!("Token expiry {exp} out of range")))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn validate(&self, token: &str) -> ServiceResult<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |err| match err.kind() {
                ErrorKind::ExpiredSignature => ServiceError::Expired,
                _ => {
                    debug!(error = %err, "Rejected bearer token");
                    ServiceError::Unauthenticated
                }
            },
        )?;

        // The library accepts exp == now; treat that instant as expired.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(ServiceError::Expired);
        }
        Ok(data.claims)
    }

    /// New token for the same identity, allowed only inside the refresh window.
    pub fn refresh(&self, token: &str) -> ServiceResult<IssuedToken> {
        let claims = self.validate(token)?;
        let now = Utc::now().timestamp();
        if claims.exp - now > self.config.refresh_window_seconds {
            return Err(ServiceError::TooEarly);
        }

        let exp = (now + self.config.refresh_ttl_seconds).max(claims.exp + 1);
        self.issue_with_expiry(&claims.username, now, exp)
    }
}
