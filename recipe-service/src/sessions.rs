use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CookieSameSite;
use crate::credentials::VerifiedIdentity;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub username: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && self.expires_at > now
    }
}

/// Server-side session storage keyed by the id carried in the cookie.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>>;
    async fn store(&self, session_id: &str, record: &SessionRecord, ttl_seconds: u64) -> Result<()>;
    async fn remove(&self, session_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisSessionBackend {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisSessionBackend {
    pub fn new(manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            manager,
            prefix: prefix.into(),
        }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.prefix, session_id)
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn
            .get(self.key(session_id))
            .await
            .context("Redis GET session failed")?;
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(error = %err, "Ignoring unreadable session record");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn store(&self, session_id: &str, record: &SessionRecord, ttl_seconds: u64) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize session")?;
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key(session_id))
            .arg(json)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .context("Redis SET EX session failed")?;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .del(self.key(session_id))
            .await
            .context("Redis DEL session failed")?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySessionBackend {
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.lock().await.get(session_id).cloned())
    }

    async fn store(&self, session_id: &str, record: &SessionRecord, _ttl_seconds: u64) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(session_id.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<()> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: u64,
    pub secure: bool,
    pub same_site: CookieSameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "recipes_api".to_string(),
            ttl_seconds: 3600,
            secure: false,
            same_site: CookieSameSite::Lax,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub cookie: String,
}

pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, config: SessionConfig) -> Self {
        Self { backend, config }
    }

    /// Starts a new session, destroying `previous` first when one was presented.
    pub async fn sign_in(
        &self,
        identity: &VerifiedIdentity,
        previous: Option<&str>,
    ) -> ServiceResult<IssuedSession> {
        let now = Utc::now();
        let expires_at = i64::try_from(self.config.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                ServiceError::Internal(format!(
                    "Session TTL {}s is out of range",
                    self.config.ttl_seconds
                ))
            })?;

        if let Some(previous) = previous {
            self.backend
                .remove(previous)
                .await
                .map_err(ServiceError::backend)?;
            debug!("Rotated previous session");
        }

        let record = SessionRecord {
            username: identity.username.clone(),
            token: random_token(),
            created_at: now,
            expires_at,
        };
        let session_id = random_token();
        self.backend
            .store(&session_id, &record, self.config.ttl_seconds)
            .await
            .map_err(ServiceError::backend)?;
        info!(username = %identity.username, "Session started");

        let cookie = self.session_cookie(&session_id);
        Ok(IssuedSession { session_id, cookie })
    }

    /// Deletes the server-side session if any and returns a cookie that clears the client copy.
    pub async fn sign_out(&self, session_id: Option<&str>) -> ServiceResult<String> {
        if let Some(session_id) = session_id {
            self.backend
                .remove(session_id)
                .await
                .map_err(ServiceError::backend)?;
        }
        Ok(self.clearing_cookie())
    }

    pub async fn is_authenticated(&self, session_id: &str) -> ServiceResult<bool> {
        let record = self
            .backend
            .load(session_id)
            .await
            .map_err(ServiceError::backend)?;
        Ok(record.is_some_and(|r| r.is_live(Utc::now())))
    }

    /// Session id from the request's `Cookie` headers.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.config.cookie_name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn session_cookie(&self, session_id: &str) -> String {
        self.cookie(session_id, self.config.ttl_seconds)
    }

    fn clearing_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; Path=/; SameSite={}; Max-Age={}",
            self.config.cookie_name,
            value,
            self.config.same_site.as_str(),
            max_age
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> (SessionManager, InMemorySessionBackend) {
        let backend = InMemorySessionBackend::new();
        let manager = SessionManager::new(Arc::new(backend.clone()), SessionConfig::default());
        (manager, backend)
    }

    fn alice() -> VerifiedIdentity {
        VerifiedIdentity {
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn sign_in_then_out() {
        let (manager, _) = manager();
        let issued = manager.sign_in(&alice(), None).await.unwrap();
        assert!(issued.cookie.starts_with("recipes_api="));
        assert!(issued.cookie.contains("HttpOnly"));
        assert!(issued.cookie.contains("Max-Age=3600"));
        assert!(manager.is_authenticated(&issued.session_id).await.unwrap());

        let cleared = manager.sign_out(Some(&issued.session_id)).await.unwrap();
        assert!(cleared.contains("Max-Age=0"));
        assert!(!manager.is_authenticated(&issued.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn sign_in_rotates_previous_session() {
        let (manager, backend) = manager();
        let first = manager.sign_in(&alice(), None).await.unwrap();
        let second = manager
            .sign_in(&alice(), Some(&first.session_id))
            .await
            .unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert!(!manager.is_authenticated(&first.session_id).await.unwrap());
        assert!(manager.is_authenticated(&second.session_id).await.unwrap());
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn expired_or_tokenless_sessions_are_rejected() {
        let (manager, backend) = manager();
        let now = Utc::now();
        let expired = SessionRecord {
            username: "alice".into(),
            token: "t".into(),
            created_at: now - Duration::seconds(7200),
            expires_at: now - Duration::seconds(3600),
        };
        backend.store("old", &expired, 1).await.unwrap();
        let tokenless = SessionRecord {
            token: String::new(),
            expires_at: now + Duration::seconds(60),
            ..expired
        };
        backend.store("blank", &tokenless, 60).await.unwrap();

        assert!(!manager.is_authenticated("old").await.unwrap());
        assert!(!manager.is_authenticated("blank").await.unwrap());
        assert!(!manager.is_authenticated("missing").await.unwrap());
    }

    #[test]
    fn session_id_is_read_from_cookie_header() {
        let (manager, _) = manager();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; recipes_api=abc123"),
        );
        assert_eq!(manager.session_id(&headers).as_deref(), Some("abc123"));
        assert_eq!(manager.session_id(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn out_of_range_ttl_fails_without_storing() {
        let backend = InMemorySessionBackend::new();
        let config = SessionConfig {
            ttl_seconds: u64::MAX / 2,
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(Arc::new(backend.clone()), config);

        let err = manager.sign_in(&alice(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
        assert_eq!(backend.len().await, 0);
    }

    #[test]
    fn secure_flag_is_appended() {
        let config = SessionConfig {
            secure: true,
            same_site: CookieSameSite::Strict,
            ..SessionConfig::default()
        };
        let manager = SessionManager::new(Arc::new(InMemorySessionBackend::new()), config);
        let cookie = manager.session_cookie("id");
        assert!(cookie.ends_with("; Secure"));
        assert!(cookie.contains("SameSite=Strict"));
    }
}
