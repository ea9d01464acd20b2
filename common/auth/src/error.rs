use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header is not a bearer credential")]
    InvalidAuthorization,
    #[error("token header names no key id")]
    MissingKeyId,
    #[error("issuer has no signing key '{0}'")]
    UnknownKeyId(String),
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("token has expired")]
    Expired,
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("claim '{0}' is unusable: '{1}'")]
    InvalidClaim(&'static str, String),
    /// The issuer's key set could not be downloaded or understood.
    #[error("issuer key set unavailable: {0}")]
    KeySet(String),
}

impl AuthError {
    /// False when the failure lies with the issuer's key set rather than the presented token.
    pub fn is_credential_failure(&self) -> bool {
        !matches!(self, AuthError::KeySet(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Rejected(value.to_string()),
        }
    }
}
