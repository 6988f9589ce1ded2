//! Read Cache
//!
//! Key-value cache with per-key expiry in front of the Record Store's read
//! endpoints. Values are JSON strings.
//!
//! Entries are never invalidated by writes: a settled transaction or a new
//! snapshot becomes visible to cached readers only after the key's TTL runs
//! out. Cache errors are surfaced to the caller, never papered over with a
//! store read.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedSizedCache};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default TTL for entity reads in seconds
pub const ENTITY_TTL_SECS: u64 = 60;

/// Default capacity before least-recently-used eviction
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait ReadCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` with the cache's entity TTL
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
}

/// Typed read through [`ReadCache::get`]
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn ReadCache,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match cache.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

/// Typed write through [`ReadCache::set`]
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn ReadCache,
    key: &str,
    value: &T,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    cache.set(key, raw).await
}

// ============================================================================
// Keys
// ============================================================================

pub mod keys {
    pub const STOCKS: &str = "stocks";

    pub fn user(username: &str) -> String {
        format!("user_{}", username)
    }

    pub fn stock(ticker: &str) -> String {
        format!("stock_{}", ticker)
    }

    pub fn user_transactions(user_id: i64) -> String {
        format!("user_transactions_{}", user_id)
    }

    pub fn user_transactions_range(user_id: i64, start: &str, end: &str) -> String {
        format!("user_transactions_{}_{}_{}", user_id, start, end)
    }
}

// ============================================================================
// In-process implementation
// ============================================================================

/// TTL + size bounded cache local to this process
pub struct InProcessCache {
    entries: Mutex<TimedSizedCache<String, String>>,
}

impl InProcessCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(TimedSizedCache::with_size_and_lifespan(
                max_entries.max(1),
                ttl.as_secs(),
            )),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TimedSizedCache<String, String>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))
    }
}

impl Default for InProcessCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, Duration::from_secs(ENTITY_TTL_SECS))
    }
}

#[async_trait]
impl ReadCache for InProcessCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock()?;
        Ok(entries.cache_get(&key.to_string()).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut entries = self.lock()?;
        entries.cache_set(key.to_string(), value);
        Ok(())
    }
}
