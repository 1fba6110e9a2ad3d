//! Shared key-value store abstraction
//!
//! Circuit-breaker state and rate-limit counters live behind
//! [`KeyValueStore`] so every worker observing the same backend sees the same
//! circuit. Implementations must make [`KeyValueStore::increment`] atomic.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryKeyValueStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("key-value backend failure: {0}")]
    Backend(String),

    #[error("value stored under '{key}' is not a counter")]
    NotACounter { key: String },
}

pub type KvResult<T> = Result<T, KvError>;

/// TTL-aware key-value store with an atomic counter primitive.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Current value, `None` when missing or expired.
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// Overwrite `key`. `None` keeps the entry until it is forgotten.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// Atomically add one to the counter under `key` and re-arm its TTL.
    /// Expired or missing counters restart at zero. Returns the new value.
    async fn increment(&self, key: &str, ttl: Duration) -> KvResult<u64>;

    async fn forget(&self, key: &str) -> KvResult<()>;

    /// Counter value, zero when missing or expired.
    async fn count(&self, key: &str) -> KvResult<u64> {
        match self.get(key).await? {
            Some(raw) => {
                raw.trim().parse().map_err(|_| KvError::NotACounter { key: key.to_string() })
            }
            None => Ok(0),
        }
    }
}
