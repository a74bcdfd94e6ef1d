#![deny(clippy::all)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points for the backing key/value store

/// Lazily produced keys from a server-side scan; each item is one key or the error that ended the scan
pub type KeyStream = BoxStream<'static, Result<String>>;

/// Port for the remote key/value store (e.g., Redis)
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn string_get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrites any existing value; the store owns expiry
    async fn string_set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Deleting a missing key is not an error
    async fn key_delete(&self, key: &str) -> Result<()>;

    /// Stream keys matching a glob `pattern` without materializing the whole key set.
    /// Dropping the stream releases any server-side cursor.
    fn scan_keys(&self, pattern: &str) -> KeyStream;
}
