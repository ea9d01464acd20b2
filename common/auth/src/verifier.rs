use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwks::JwksFetcher;

/// Thread-safe store for decoding keys loaded from JWKS/PEM sources.
#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    inner: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&self, kid: impl Into<String>, key: DecodingKey) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(kid.into(), key);
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.len()
    }

    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        for (kid, key) in entries.into_iter() {
            guard.insert(kid, key);
        }
    }
}

/// Verifies RS256 tokens from an external issuer.
///
/// The issuer's key set is fetched the first time a token needs it and then kept for
/// the lifetime of the process. Only one fetch runs at a time; a failed fetch is not
/// remembered, so the next request tries again.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    store: InMemoryKeyStore,
    jwks: Option<JwksFetcher>,
    keys_loaded: Arc<AtomicBool>,
    fetch_lock: Arc<Mutex<()>>,
}

impl JwtVerifier {
    pub fn with_store(config: JwtConfig, store: InMemoryKeyStore) -> Self {
        Self {
            config,
            store,
            jwks: None,
            keys_loaded: Arc::new(AtomicBool::new(false)),
            fetch_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn store(&self) -> &InMemoryKeyStore {
        &self.store
    }

    /// Verifies against whatever keys are currently held; never touches the network.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::Malformed(err.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self
            .store
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(kid, "verified JWT successfully");
        Ok(claims)
    }

    /// Loads the issuer's keys if they have not been loaded yet, then verifies.
    pub async fn verify_on_demand(&self, token: &str) -> AuthResult<Claims> {
        self.ensure_keys().await?;
        self.verify(token)
    }

    pub async fn ensure_keys(&self) -> AuthResult<()> {
        if self.jwks.is_none() || self.keys_loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.fetch_lock.lock().await;
        if self.keys_loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        let count = self.refresh_jwks().await?;
        if count > 0 {
            self.keys_loaded.store(true, Ordering::Release);
            info!(count, "Loaded issuer signing keys");
        }
        Ok(())
    }

    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let fetcher = match &self.jwks {
            Some(fetcher) => fetcher,
            None => return Ok(0),
        };

        let keys = fetcher.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.store.replace_all(keys);
        }
        Ok(count)
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    jwks: Option<JwksFetcher>,
}

impl JwtVerifierBuilder {
    fn new(config: JwtConfig) -> Self {
        Self { config, jwks: None }
    }

    /// Fetch keys from the issuer's well-known JWKS document.
    pub fn with_issuer_jwks(self) -> AuthResult<Self> {
        let url = self.config.jwks_url();
        self.with_jwks_url(url)
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> AuthResult<Self> {
        self.jwks = Some(JwksFetcher::with_timeout(url, self.config.fetch_timeout)?);
        Ok(self)
    }

    pub fn build(self) -> JwtVerifier {
        JwtVerifier {
            config: self.config,
            store: InMemoryKeyStore::new(),
            jwks: self.jwks,
            keys_loaded: Arc::new(AtomicBool::new(false)),
            fetch_lock: Arc::new(Mutex::new(())),
        }
    }
}
