use crate::pattern::glob_match;
use async_trait::async_trait;
use cache_manager::ports::{KeyStream, KeyValueStore};
use futures::StreamExt;
use moka::Expiry;
use moka::future::Cache;
use shared::Result;
use std::fmt::Debug;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with; a zero TTL never expires
struct PerEntryTtl;

impl PerEntryTtl {
    fn expiry(value: &StoredValue) -> Option<Duration> {
        (!value.ttl.is_zero()).then_some(value.ttl)
    }
}

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        Self::expiry(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Self::expiry(value)
    }
}

/// Moka-based in-process store with per-entry TTL.
/// Stands in for the remote store during local development and tests.
pub struct MokaStore {
    cache: Cache<String, StoredValue>,
}

impl MokaStore {
    /// Create an unbounded store
    pub fn new_unbounded() -> Self {
        Self {
            cache: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }

    /// Create a store holding at most `max_entries` keys
    pub fn new_bounded(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new_unbounded()
    }
}

#[async_trait]
impl KeyValueStore for MokaStore {
    async fn string_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Either doesn't exist or TTL expired
        Ok(self.cache.get(key).await.map(|value| value.bytes))
    }

    async fn string_set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.cache
            .insert(key.to_string(), StoredValue { bytes: value, ttl })
            .await;
        Ok(())
    }

    async fn key_delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn scan_keys(&self, pattern: &str) -> KeyStream {
        // Keys already live in memory, so a snapshot of the matches is taken up front
        let matched: Vec<Result<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| Ok(String::clone(&key)))
            .collect();
        futures::stream::iter(matched).boxed()
    }
}

impl Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .field("weighted_size", &self.cache.weighted_size())
            .finish()
    }
}
