//! Two-tier rotation state store.
//!
//! Reads try the shared cache first and fall back to a process-local
//! shadow map; writes always update the shadow, so cache outages
//! degrade to per-process correctness instead of failing the caller.

use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::cache::SharedCache;

/// TTL applied to every rotation entry.
pub const ROTATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Typed wrapper over the shared cache with an in-memory fallback map.
///
/// The store is the only component that touches the cache collaborator.
pub struct RotationStore<C: SharedCache> {
    cache: C,
    fallback: DashMap<String, String>,
}

impl<C: SharedCache> RotationStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            fallback: DashMap::new(),
        }
    }

    /// Fetch and deserialize the value under `key`.
    ///
    /// Cache errors and misses fall through to the fallback map;
    /// absence in both means "start a fresh cycle" for the caller.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Some(value),
                Err(error) => {
                    warn!(key, %error, "discarding undecodable rotation entry");
                }
            },
            Ok(None) => {}
            Err(error) => {
                warn!(key, %error, "cache read failed, using in-memory fallback");
            }
        }

        self.fallback
            .get(key)
            .and_then(|raw| serde_json::from_str(raw.value()).ok())
    }

    /// Serialize and store the value under `key` with `ttl`.
    ///
    /// Cache write errors are logged and absorbed; the fallback map is
    /// updated regardless, so the call itself never fails.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(key, %error, "failed to serialize rotation entry");
                return;
            }
        };

        self.fallback.insert(key.to_string(), raw.clone());

        if let Err(error) = self.cache.set(key, &raw, ttl).await {
            warn!(key, %error, "cache write failed, fallback retains entry");
        }
    }

    /// Remove `key` from both tiers.
    pub async fn delete(&self, key: &str) {
        self.fallback.remove(key);
        if let Err(error) = self.cache.delete(key).await {
            warn!(key, %error, "cache delete failed");
        }
    }
}
