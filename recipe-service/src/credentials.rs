use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand_core::OsRng;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Verified against when the username is unknown, so both failure paths pay for one hash.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("not-a-real-password").ok());

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            "SELECT username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load credential record")?;
        Ok(record)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    users: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, username: &str, password: &str) -> Result<Self> {
        let hash = hash_password(password)?;
        self.users
            .try_write()
            .map_err(|_| anyhow!("credential store is in use; cannot add {username}"))?
            .insert(username.to_string(), hash);
        Ok(self)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>> {
        Ok(self
            .users
            .read()
            .await
            .get(username)
            .map(|hash| CredentialRecord {
                username: username.to_string(),
                password_hash: hash.clone(),
            }))
    }
}

/// Salted argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(anyhow!("Password must not be empty"));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("Failed to hash password: {err}"))
}

fn password_matches(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Identity proven by a successful password check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
}

#[derive(Clone)]
pub struct PasswordAuthenticator {
    store: Arc<dyn CredentialStore>,
}

impl PasswordAuthenticator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Unknown users and wrong passwords both come back as `Unauthenticated`.
    pub async fn verify(&self, username: &str, password: &str) -> ServiceResult<VerifiedIdentity> {
        let record = self
            .store
            .find_by_username(username)
            .await
            .map_err(ServiceError::backend)?;

        match record {
            Some(record) => {
                if password_matches(password, &record.password_hash) {
                    Ok(VerifiedIdentity {
                        username: record.username,
                    })
                } else {
                    debug!(username = %username, "Password mismatch");
                    Err(ServiceError::Unauthenticated)
                }
            }
            None => {
                if let Some(dummy) = DUMMY_HASH.as_deref() {
                    let _ = password_matches(password, dummy);
                }
                debug!(username = %username, "Unknown username");
                Err(ServiceError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> PasswordAuthenticator {
        let store = InMemoryCredentialStore::new()
            .with_user("alice", "correct horse")
            .unwrap();
        PasswordAuthenticator::new(Arc::new(store))
    }

    #[tokio::test]
    async fn correct_password_yields_identity() {
        let identity = authenticator()
            .verify("alice", "correct horse")
            .await
            .unwrap();
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn failures_are_indistinguishable() {
        let auth = authenticator();
        let wrong = auth.verify("alice", "battery staple").await.unwrap_err();
        let unknown = auth.verify("mallory", "correct horse").await.unwrap_err();
        assert!(matches!(wrong, ServiceError::Unauthenticated));
        assert!(matches!(unknown, ServiceError::Unauthenticated));
    }

    #[test]
    fn adding_user_to_a_locked_store_fails() {
        let store = InMemoryCredentialStore::new();
        let reader = store.clone();
        let _guard = reader.users.try_read().unwrap();

        let err = store.with_user("alice", "pw").err().unwrap();
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
        assert!(password_matches("pw", &a));
        assert!(!password_matches("pw", "plaintext"));
    }
}
