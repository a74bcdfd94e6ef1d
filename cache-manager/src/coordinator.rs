use crate::codec::{Codec, JsonCodec};
use crate::key::DerivedKey;
use crate::ports::KeyValueStore;
use futures::StreamExt;
use shared::{Error, Result};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of a pattern invalidation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InvalidationSummary {
    /// Keys the scan produced
    pub matched: usize,
    /// Deletes that completed without error
    pub deleted: usize,
}

/// Cache-aside coordinator in front of a [`KeyValueStore`].
///
/// Holds no mutable state: the store handle is shared read-only, so one instance can be
/// cloned and used from many tasks at once. Nothing serializes concurrent misses on the
/// same key; each caller runs its own factory and the last write wins.
#[derive(Clone)]
pub struct CacheCoordinator<C = JsonCodec> {
    store: Arc<dyn KeyValueStore>,
    codec: C,
}

impl CacheCoordinator<JsonCodec> {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_codec(store, JsonCodec)
    }
}

impl<C> CacheCoordinator<C> {
    pub fn with_codec(store: Arc<dyn KeyValueStore>, codec: C) -> Self {
        Self { store, codec }
    }

    /// Fetch and decode the item stored under `key`, if any
    pub async fn get<T>(&self, key: &DerivedKey) -> Result<Option<T>>
    where
        C: Codec<T>,
    {
        key.ensure_valid()?;

        match self.store.string_get(key.key()).await? {
            Some(bytes) => {
                debug!("Cache hit for key '{}'", key);
                self.codec.decode(&bytes).map(Some)
            }
            None => {
                debug!("Cache miss for key '{}'", key);
                Ok(None)
            }
        }
    }

    /// Return the cached item, or run `factory` once, cache its result for `ttl` and return it.
    ///
    /// Factory errors are returned as-is and nothing is cached.
    pub async fn get_or_populate<T, F, Fut, E>(
        &self,
        key: &DerivedKey,
        factory: F,
        ttl: Duration,
    ) -> std::result::Result<T, E>
    where
        C: Codec<T>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        key.ensure_valid()?;

        if let Some(item) = self.get(key).await? {
            return Ok(item);
        }

        let item = factory().await?;
        self.set(key, &item, ttl).await?;
        Ok(item)
    }

    /// Store `item` under `key`, replacing whatever was there
    pub async fn set<T>(&self, key: &DerivedKey, item: &T, ttl: Duration) -> Result<()>
    where
        C: Codec<T>,
    {
        key.ensure_valid()?;

        let bytes = self.codec.encode(item)?;
        self.store.string_set(key.key(), bytes, ttl).await?;
        debug!("Cached key '{}' for {:?}", key, ttl);
        Ok(())
    }

    pub async fn invalidate(&self, key: &DerivedKey) -> Result<()> {
        key.ensure_valid()?;

        self.store.key_delete(key.key()).await?;
        debug!("Invalidated key '{}'", key);
        Ok(())
    }

    /// Delete every key containing `fragment`.
    ///
    /// A blank or absent fragment does nothing, so the whole keyspace can never be matched.
    /// Each scanned key is deleted on its own task while the scan continues; all of them are
    /// joined before returning, even when the scan fails. A scan failure leaves unseen keys in
    /// place and is returned after the drain. Otherwise the first failed delete is returned.
    pub async fn invalidate_by_pattern(&self, fragment: Option<&str>) -> Result<InvalidationSummary> {
        let fragment = match fragment {
            Some(fragment) if !fragment.trim().is_empty() => fragment,
            _ => {
                debug!("Skipping pattern invalidation for blank fragment");
                return Ok(InvalidationSummary::default());
            }
        };

        let pattern = format!("*{}*", fragment);
        let mut keys = self.store.scan_keys(&pattern);
        let mut deletes = JoinSet::new();
        let mut summary = InvalidationSummary::default();
        let mut scan_error = None;

        while let Some(next) = keys.next().await {
            match next {
                Ok(key) => {
                    summary.matched += 1;
                    let store = Arc::clone(&self.store);
                    deletes.spawn(async move {
                        let result = store.key_delete(&key).await;
                        (key, result)
                    });
                }
                Err(e) => {
                    warn!("Scan for pattern '{}' failed after {} key(s): {}", pattern, summary.matched, e);
                    scan_error = Some(e);
                    break;
                }
            }
        }
        drop(keys);

        let mut delete_error = None;
        while let Some(joined) = deletes.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.deleted += 1,
                Ok((key, Err(e))) => {
                    warn!("Failed to delete key '{}': {}", key, e);
                    delete_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!("Delete task for pattern '{}' did not complete: {}", pattern, e);
                    delete_error.get_or_insert(Error::Internal(format!("Delete task failed: {}", e)));
                }
            }
        }

        if let Some(e) = scan_error.or(delete_error) {
            return Err(e);
        }

        info!(
            "Invalidated {} of {} key(s) matching '{}'",
            summary.deleted, summary.matched, pattern
        );
        Ok(summary)
    }
}

impl<C> Debug for CacheCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("store", &"<dyn KeyValueStore>")
            .finish()
    }
}
