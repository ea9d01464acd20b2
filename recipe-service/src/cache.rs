use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Key/value cache used by the repository. A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Stores without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

// ---------------- Redis Implementation ----------------

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisCache {
    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self::from_manager(manager, prefix))
    }

    pub fn from_manager(manager: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { manager, prefix: prefix.into() }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(self.key(key))
            .await
            .context("Redis GET failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set(self.key(key), value)
            .await
            .context("Redis SET failed")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(self.key(key)).await.context("Redis DEL failed")?;
        Ok(())
    }
}

// ---------------- In-Memory Implementation (Tests) ----------------

/// Process-local cache with operation counters and a switch that makes every call fail.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<Mutex<HashMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
    gets: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.contains_key(key)
    }

    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.inner.lock().await.insert(key.to_string(), value.to_string());
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(anyhow!("cache connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.inner.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.inner.lock().await.remove(key);
        Ok(())
    }
}
