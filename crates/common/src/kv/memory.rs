//! In-process key-value store backed by a sharded concurrent map.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{KeyValueStore, KvError, KvResult};
use crate::time::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Store shared by every worker in one process.
///
/// Expiry is evaluated lazily against the injected [`Clock`]; expired
/// entries are dropped on the next access.
pub struct MemoryKeyValueStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl?).ok()?;
        self.clock.now().checked_add_signed(ttl)
    }

    /// Live entry count. Used for diagnostics only.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|entry| entry.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let now = self.clock.now();
        let live = self.entries.get(key).map(|entry| (entry.is_live(now), entry.value.clone()));

        match live {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.entries.remove_if(key, |_, stored| !stored.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let stored = StoredValue { value: value.to_string(), expires_at: self.expiry(ttl) };
        self.entries.insert(key.to_string(), stored);
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> KvResult<u64> {
        let now = self.clock.now();
        let expires_at = self.expiry(Some(ttl));

        // The entry guard holds the shard lock for the read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = if occupied.get().is_live(now) {
                    occupied
                        .get()
                        .value
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| KvError::NotACounter { key: key.to_string() })?
                } else {
                    0
                };
                let next = current.saturating_add(1);
                occupied.insert(StoredValue { value: next.to_string(), expires_at });
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue { value: "1".to_string(), expires_at });
                Ok(1)
            }
        }
    }

    async fn forget(&self, key: &str) -> KvResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
