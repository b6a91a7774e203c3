//! Response/embedding cache and temporal locks.
//!
//! All cache traffic goes through [`SafeCache`], which swallows backend
//! errors: a cache outage degrades to recompute, never to request failure.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Error local to the cache layer. Never crosses into the core taxonomy.
#[derive(Debug, thiserror::Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError(err.to_string())
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;
}

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Disabled cache: always misses, set is a no-op.
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Cache wrapper that logs and swallows backend errors.
#[derive(Clone)]
pub struct SafeCache {
    inner: Arc<dyn CacheBackend>,
}

impl SafeCache {
    pub fn new(inner: Arc<dyn CacheBackend>) -> Self {
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache))
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        match self.inner.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set_string(&self, key: &str, value: &str, ttl_seconds: u64) {
        if let Err(e) = self.inner.set(key, value, ttl_seconds).await {
            warn!(key, error = %e, "cache set failed, skipping");
        }
    }

    /// Fetch a structured value. Undecodable entries count as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_string(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cache entry is not decodable, treating as miss");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_string(key, &raw, ttl_seconds).await,
            Err(e) => warn!(key, error = %e, "value is not serializable, skipping cache set"),
        }
    }
}

/// Distributed temporal lock: a named key held with a TTL via set-if-absent.
///
/// Not re-entrant. Losing the race must be free, so tasks guarded by this
/// lock are idempotent.
#[derive(Clone)]
pub struct TemporalLock {
    manager: ConnectionManager,
}

impl TemporalLock {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Try to take the lock. Returns true when this caller won it.
    pub async fn acquire(&self, name: &str, ttl_seconds: u64) -> bool {
        let mut conn = self.manager.clone();
        let result = redis::cmd("SET")
            .arg(format!("rtl:{name}"))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<Option<String>>(&mut conn)
            .await;

        match result {
            Ok(reply) => reply.is_some(),
            Err(e) => {
                warn!(name, error = %e, "temporal lock acquisition failed");
                false
            }
        }
    }

    pub async fn release(&self, name: &str) {
        let mut conn = self.manager.clone();
        if let Err(e) = redis::cmd("DEL")
            .arg(format!("rtl:{name}"))
            .query_async::<()>(&mut conn)
            .await
        {
            warn!(name, error = %e, "temporal lock release failed");
        }
    }
}
