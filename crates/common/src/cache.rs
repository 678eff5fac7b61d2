//! Cache abstraction for TTL key-value storage.
//!
//! The cache is authoritative for all ephemeral state: OTP sessions,
//! rate-limit counters and the token blacklist. Expiry is the lifecycle —
//! nothing here is ever migrated to durable storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::Expiration;
use fred::types::config::Config as RedisConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::{AppError, AppResult};

/// String-keyed cache with per-key TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value by key. Returns `None` if absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value with a TTL in seconds.
    async fn set(&self, key: &str, value: &str, ttl_secs: i64) -> AppResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Check whether a key exists and has not expired.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// JSON convenience helpers over any [`Cache`].
#[async_trait]
pub trait CacheJson: Cache {
    /// Get and deserialize a JSON value.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> AppResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("Corrupt cache entry at {key}: {e}"))),
            None => Ok(None),
        }
    }

    /// Serialize and set a JSON value with a TTL in seconds.
    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: i64,
    ) -> AppResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Failed to serialize cache entry: {e}")))?;
        self.set(key, &raw, ttl_secs).await
    }
}

impl<C: Cache + ?Sized> CacheJson for C {}

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    client: RedisClient,
}

impl RedisCache {
    /// Connect to Redis and return a ready cache.
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let config =
            RedisConfig::from_url(redis_url).map_err(|e| AppError::Redis(e.to_string()))?;

        let client = RedisClient::new(config, None, None, None);
        client
            .init()
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already-initialized Redis client.
    #[must_use]
    pub const fn from_client(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.client
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: i64) -> AppResult<()> {
        self.client
            .set::<(), _, _>(key, value, Some(Expiration::EX(ttl_secs)), None, false)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .del::<(), _>(key)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let count: i64 = self
            .client
            .exists(key)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        Ok(count > 0)
    }
}

/// In-memory cache for tests.
///
/// Keys expire against a manual clock rather than wall time, so tests can
/// cross TTL boundaries deterministically with [`InMemoryCache::advance`].
#[derive(Debug)]
pub struct InMemoryCache {
    store: RwLock<HashMap<String, (String, Option<i64>)>>,
    now_unix: AtomicI64,
}

/// Default test epoch, matching [`crate::FakeClock`]'s initial instant.
const DEFAULT_TEST_EPOCH: i64 = 1_705_320_000;

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Create an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            now_unix: AtomicI64::new(DEFAULT_TEST_EPOCH),
        }
    }

    /// Set the cache's clock to a Unix timestamp.
    pub fn set_now(&self, unix_ts: i64) {
        self.now_unix.store(unix_ts, Ordering::SeqCst);
    }

    /// Advance the cache's clock.
    pub fn advance(&self, seconds: i64) {
        self.now_unix.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Remove every key.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    fn is_expired(&self, expiry: Option<i64>) -> bool {
        expiry.is_some_and(|at| self.now_unix.load(Ordering::SeqCst) >= at)
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut store = self.store.write().await;
        match store.get(key) {
            Some((_, expiry)) if self.is_expired(*expiry) => {
                store.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: i64) -> AppResult<()> {
        let expiry = if ttl_secs > 0 {
            Some(self.now_unix.load(Ordering::SeqCst) + ttl_secs)
        } else {
            None
        };
        self.store
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expiry));
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.store.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = InMemoryCache::new();

        cache.set("k", "v", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_follows_manual_clock() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", 300).await.unwrap();

        cache.advance(299);
        assert!(cache.exists("k").await.unwrap());

        cache.advance(1);
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_refreshes_ttl() {
        let cache = InMemoryCache::new();
        cache.set("k", "v1", 100).await.unwrap();

        cache.advance(90);
        cache.set("k", "v2", 100).await.unwrap();

        cache.advance(90);
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = InMemoryCache::new();
        cache
            .set_json("counter", &41_u32, 3600)
            .await
            .unwrap();

        let value: Option<u32> = cache.get_json("counter").await.unwrap();
        assert_eq!(value, Some(41));

        let missing: Option<u32> = cache.get_json("absent").await.unwrap();
        assert_eq!(missing, None);
    }
}
