use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AuthError, AuthResult};

/// Registered claims of a verified third-party token.
#[derive(Debug, Clone)]
pub struct Claims {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Registered {
    sub: String,
    iss: String,
    exp: i64,
    #[serde(default)]
    aud: Audience,
}

#[derive(Deserialize, Default)]
#[serde(untagged)]
enum Audience {
    #[default]
    Absent,
    One(String),
    Many(Vec<String>),
}

impl TryFrom<Value> for Claims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        let registered: Registered =
            serde_json::from_value(value).map_err(|err| AuthError::Malformed(err.to_string()))?;

        if registered.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaim("sub", registered.sub));
        }
        let expires_at = Utc
            .timestamp_opt(registered.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", registered.exp.to_string()))?;
        let audience = match registered.aud {
            Audience::Absent => Vec::new(),
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        };

        Ok(Self {
            subject: registered.sub,
            issuer: registered.iss,
            audience,
            expires_at,
        })
    }
}
