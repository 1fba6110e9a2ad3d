//! Fixed-window rate limiting per service and calendar minute
//!
//! Counters live in the shared [`KeyValueStore`]; the bucket key embeds the
//! minute (`{service}-rate:YYYYMMDDHHMM`) so a new window starts at each
//! minute boundary.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::kv::{KeyValueStore, KvResult};
use crate::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Bucket key for `service` in the current calendar minute.
    pub fn minute_bucket(&self, service: &str) -> String {
        format!("{service}-rate:{}", self.clock.now().format("%Y%m%d%H%M"))
    }

    /// `true` once the bucket already holds `limit` hits.
    pub async fn too_many_attempts(&self, key: &str, limit: u32) -> KvResult<bool> {
        let hits = self.store.count(key).await?;
        Ok(hits >= u64::from(limit))
    }

    /// Count one attempt against `key`. Returns the new count.
    pub async fn hit(&self, key: &str, window: Duration) -> KvResult<u64> {
        let hits = self.store.increment(key, window).await?;
        debug!(bucket = key, hits, "rate limiter hit");
        Ok(hits)
    }

    /// Hits remaining in the bucket.
    pub async fn remaining(&self, key: &str, limit: u32) -> KvResult<u64> {
        let hits = self.store.count(key).await?;
        Ok(u64::from(limit).saturating_sub(hits))
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
