//! Two-tier cache: an optional in-memory map in front of the persisted
//! `cache` table.
//!
//! Both tiers share the same expiry rule: an entry whose `expires_at` is at or
//! before now is absent, even while its row still exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tickwell_warehouse::Warehouse;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::CacheError;

/// Interval of the background expiry sweep started by `serve`.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Persisted tier. Instants are epoch milliseconds.
pub trait CacheBackend: Send + Sync {
    fn upsert(&self, key: &str, value: &str, expires_at_ms: i64) -> Result<(), CacheError>;

    fn get(&self, key: &str, now_ms: i64) -> Result<Option<String>, CacheError>;

    fn delete_expired(&self, now_ms: i64) -> Result<usize, CacheError>;

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

impl CacheBackend for Warehouse {
    fn upsert(&self, key: &str, value: &str, expires_at_ms: i64) -> Result<(), CacheError> {
        Ok(self.cache_upsert(key, value, expires_at_ms)?)
    }

    fn get(&self, key: &str, now_ms: i64) -> Result<Option<String>, CacheError> {
        Ok(self.cache_get(key, now_ms)?)
    }

    fn delete_expired(&self, now_ms: i64) -> Result<usize, CacheError> {
        Ok(self.cache_delete_expired(now_ms)?)
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        Ok(self.cache_delete_prefix(prefix)?)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at_ms: i64,
}

#[derive(Debug, Default)]
struct MemoryTier {
    map: HashMap<String, MemoryEntry>,
}

impl MemoryTier {
    fn get(&self, key: &str, now_ms: i64) -> Option<String> {
        self.map
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms)
            .map(|entry| entry.value.clone())
    }

    fn put(&mut self, key: &str, value: String, expires_at_ms: i64) {
        self.map.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at_ms,
            },
        );
    }

    fn clear_expired(&mut self, now_ms: i64) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at_ms > now_ms);
        before - self.map.len()
    }

    fn clear_prefix(&mut self, prefix: &str) -> usize {
        let before = self.map.len();
        self.map.retain(|key, _| !key.starts_with(prefix));
        before - self.map.len()
    }
}

/// Read-through / write-through cache for assembled values.
pub struct TieredCache {
    backend: Arc<dyn CacheBackend>,
    memory: Option<tokio::sync::RwLock<MemoryTier>>,
}

impl TieredCache {
    /// `memory_first` enables the in-memory tier; without it every call goes
    /// to the persisted tier.
    pub fn new(backend: Arc<dyn CacheBackend>, memory_first: bool) -> Self {
        Self {
            backend,
            memory: memory_first.then(|| tokio::sync::RwLock::new(MemoryTier::default())),
        }
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory.is_some()
    }

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    pub async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = now_ms().saturating_add(ttl_ms);

        if let Some(memory) = &self.memory {
            memory.write().await.put(key, value.clone(), expires_at_ms);
        }

        let owned_key = key.to_string();
        self.on_backend(move |backend| backend.upsert(&owned_key, &value, expires_at_ms))
            .await
            .inspect_err(|error| warn!(key, %error, "error inserting into cache"))
    }

    /// Non-expired value for `key`, checking memory before the persisted tier.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = now_ms();
        if let Some(memory) = &self.memory {
            if let Some(value) = memory.read().await.get(key, now) {
                return Ok(Some(value));
            }
        }

        let owned_key = key.to_string();
        self.on_backend(move |backend| backend.get(&owned_key, now))
            .await
            .inspect_err(|error| warn!(key, %error, "error reading from cache"))
    }

    /// Remove expired entries from both tiers. Returns the persisted rows removed.
    pub async fn delete_expired(&self) -> Result<usize, CacheError> {
        let now = now_ms();
        if let Some(memory) = &self.memory {
            let removed = memory.write().await.clear_expired(now);
            debug!(removed, "swept expired in-memory cache entries");
        }

        self.on_backend(move |backend| backend.delete_expired(now))
            .await
            .inspect_err(|error| warn!(%error, "error deleting expired cache entries"))
    }

    /// Remove every entry whose key starts with `prefix` from both tiers.
    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        if let Some(memory) = &self.memory {
            memory.write().await.clear_prefix(prefix);
        }

        let owned_prefix = prefix.to_string();
        self.on_backend(move |backend| backend.delete_by_prefix(&owned_prefix))
            .await
            .inspect_err(|error| warn!(prefix, %error, "error deleting cache entries by prefix"))
    }

    /// Persisted-tier calls block on DuckDB, so they run on the blocking pool.
    async fn on_backend<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CacheBackend) -> Result<T, CacheError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || call(backend.as_ref())).await?
    }

    /// Serialize `value` as JSON and [`put`](Self::put) it.
    pub async fn put_obj<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        self.put(key, json, ttl).await
    }

    /// Read and decode a JSON value written by [`put_obj`](Self::put_obj).
    ///
    /// Reading a key as a different type than it was written with is a caller
    /// bug and surfaces as [`CacheError::Serialization`].
    pub async fn get_obj<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// Periodically sweep expired entries until the task is aborted.
pub fn spawn_sweeper(cache: Arc<TieredCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Ok(removed) = cache.delete_expired().await {
                info!(removed, "cache sweep finished");
            }
        }
    })
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
