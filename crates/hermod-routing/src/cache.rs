//! Shared cache abstraction.
//!
//! The cache is shared across processes but optional: callers layer a
//! process-local fallback on top (see [`RotationStore`]). Values are
//! opaque strings; serialization is the caller's concern.
//!
//! [`RotationStore`]: crate::store::RotationStore

use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

pub trait SharedCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Single-process cache backend with per-entry expiry, evicted lazily
/// on read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Redis backend (optional)
// ---------------------------------------------------------------------------

#[cfg(feature = "redis")]
mod redis_backend {
    use std::time::Duration;

    use redis::AsyncCommands;
    use redis::aio::ConnectionManager;

    use super::{CacheError, SharedCache};

    /// Redis-backed shared cache using a reconnecting connection
    /// manager.
    #[derive(Clone)]
    pub struct RedisCache {
        connection: ConnectionManager,
    }

    impl RedisCache {
        pub async fn connect(url: &str) -> Result<Self, CacheError> {
            let client =
                redis::Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
            let connection = ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            Ok(Self { connection })
        }
    }

    impl SharedCache for RedisCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            let mut connection = self.connection.clone();
            connection
                .get(key)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            let mut connection = self.connection.clone();
            connection
                .set_ex(key, value, ttl.as_secs())
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            let mut connection = self.connection.clone();
            connection
                .del(key)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_backend::RedisCache;

// ---------------------------------------------------------------------------
// Runtime-selected backend
// ---------------------------------------------------------------------------

/// Backend chosen from configuration at startup.
pub enum CacheBackend {
    Memory(MemoryCache),
    #[cfg(feature = "redis")]
    Redis(RedisCache),
}

impl SharedCache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis")]
            CacheBackend::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis")]
            CacheBackend::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            CacheBackend::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis")]
            CacheBackend::Redis(cache) => cache.delete(key).await,
        }
    }
}
