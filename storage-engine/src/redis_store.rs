use async_trait::async_trait;
use cache_manager::ports::{KeyStream, KeyValueStore};
use futures::{StreamExt, TryStreamExt, stream};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use shared::config::Config;
use shared::{Error, Result};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

fn store_error(operation: &'static str) -> impl Fn(RedisError) -> Error {
    move |e| Error::Store(format!("Redis {} error: {}", operation, e))
}

/// Milliseconds for `SET ... PX`; `None` stores without expiry.
/// Redis keeps expiry as a signed 64-bit millisecond count, so longer TTLs are rejected.
fn expiry_millis(ttl: Duration) -> Result<Option<u64>> {
    if ttl.is_zero() {
        return Ok(None);
    }
    i64::try_from(ttl.as_millis().max(1))
        .map(|millis| Some(millis as u64))
        .map_err(|_| Error::Store(format!("TTL of {:?} exceeds the Redis expiry range", ttl)))
}

/// Redis-backed store over a multiplexed connection.
/// Clones of the connection share one socket, so concurrent calls need no pooling.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    scan_page_size: usize,
}

impl RedisStore {
    /// Connect eagerly using `config.connection_string`
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = Client::open(config.connection_string.as_str()).map_err(store_error("client"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error("connection"))?;

        info!("Connected to Redis at {}", client.get_connection_info().addr);

        Ok(Self {
            conn,
            scan_page_size: config.scan_page_size,
        })
    }
}

/// One SCAN round trip: returns the next cursor and the page of keys
#[async_trait]
trait ScanSource: Send + 'static {
    async fn scan_page(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;
}

#[async_trait]
impl ScanSource for MultiplexedConnection {
    async fn scan_page(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(self)
            .await
            .map_err(store_error("SCAN"))
    }
}

struct ScanState<S> {
    source: S,
    pattern: String,
    page_size: usize,
    // None once the server has returned cursor 0
    cursor: Option<u64>,
}

impl<S: ScanSource> ScanState<S> {
    /// Fetch pages until one has keys or the cursor is exhausted
    async fn next_page(mut self) -> Result<Option<(Vec<String>, Self)>> {
        while let Some(cursor) = self.cursor {
            let (next, page) = self
                .source
                .scan_page(cursor, &self.pattern, self.page_size)
                .await?;

            self.cursor = (next != 0).then_some(next);
            debug!("SCAN page for '{}' returned {} key(s)", self.pattern, page.len());

            if !page.is_empty() {
                return Ok(Some((page, self)));
            }
        }
        Ok(None)
    }
}

/// Stream keys page by page; a failed page ends the stream with its error
fn key_stream<S: ScanSource>(source: S, pattern: &str, page_size: usize) -> KeyStream {
    let state = ScanState {
        source,
        pattern: pattern.to_string(),
        page_size,
        cursor: Some(0),
    };

    stream::try_unfold(state, ScanState::next_page)
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<String, Error>)))
        .try_flatten()
        .boxed()
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn string_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_error("GET"))
    }

    async fn string_set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let expiry = expiry_millis(ttl)?;
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(millis) = expiry {
            cmd.arg("PX").arg(millis);
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(store_error("SET"))?;
        Ok(())
    }

    async fn key_delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await.map_err(store_error("DEL"))?;
        Ok(())
    }

    fn scan_keys(&self, pattern: &str) -> KeyStream {
        key_stream(self.conn.clone(), pattern, self.scan_page_size)
    }
}

impl Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"<redis::aio::MultiplexedConnection>")
            .field("scan_page_size", &self.scan_page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted SCAN replies and records each request
    struct ScriptedScan {
        replies: VecDeque<Result<(u64, Vec<String>)>>,
        requests: Arc<Mutex<Vec<(u64, String, usize)>>>,
    }

    impl ScriptedScan {
        fn new(replies: Vec<Result<(u64, Vec<&str>)>>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|reply| reply.map(|(cursor, keys)| (cursor, keys.into_iter().map(String::from).collect())))
                    .collect(),
                requests: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ScanSource for ScriptedScan {
        async fn scan_page(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
            self.requests
                .lock()
                .unwrap()
                .push((cursor, pattern.to_string(), count));
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(Error::Internal("SCAN called after cursor 0".to_string())))
        }
    }

    #[tokio::test]
    async fn test_scan_follows_cursor_until_zero() {
        let source = ScriptedScan::new(vec![
            Ok((17, vec!["User-1", "User-2"])),
            Ok((42, vec!["User-3"])),
            Ok((0, vec!["User-4"])),
            // Never requested: cursor 0 ends the scan
            Ok((99, vec!["stale"])),
        ]);
        let requests = source.requests.clone();

        let keys: Vec<String> = key_stream(source, "*User*", 100).try_collect().await.unwrap();

        assert_eq!(keys, vec!["User-1", "User-2", "User-3", "User-4"]);
        assert_eq!(
            *requests.lock().unwrap(),
            vec![
                (0, "*User*".to_string(), 100),
                (17, "*User*".to_string(), 100),
                (42, "*User*".to_string(), 100),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_skips_empty_pages_while_cursor_open() {
        let source = ScriptedScan::new(vec![
            Ok((5, vec![])),
            Ok((9, vec![])),
            Ok((3, vec!["Order-1"])),
            Ok((0, vec![])),
        ]);
        let requests = source.requests.clone();

        let keys: Vec<String> = key_stream(source, "*Order*", 10).try_collect().await.unwrap();

        assert_eq!(keys, vec!["Order-1"]);
        let cursors: Vec<u64> = requests.lock().unwrap().iter().map(|(c, _, _)| *c).collect();
        assert_eq!(cursors, vec![0, 5, 9, 3]);
    }

    #[tokio::test]
    async fn test_scan_with_no_matches_is_empty() {
        let source = ScriptedScan::new(vec![Ok((0, vec![]))]);

        let keys: Vec<String> = key_stream(source, "*x*", 10).try_collect().await.unwrap();

        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_scan_error_ends_stream() {
        let source = ScriptedScan::new(vec![
            Ok((8, vec!["a", "b"])),
            Err(Error::Store("Redis SCAN error: connection reset".to_string())),
            Ok((0, vec!["c"])),
        ]);
        let requests = source.requests.clone();

        let items: Vec<Result<String>> = key_stream(source, "*", 10).collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert_eq!(items[1].as_ref().unwrap(), "b");
        assert!(matches!(items[2], Err(Error::Store(_))));
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_expiry_millis() {
        assert_eq!(expiry_millis(Duration::ZERO).unwrap(), None);
        assert_eq!(expiry_millis(Duration::from_micros(1)).unwrap(), Some(1));
        assert_eq!(expiry_millis(Duration::from_millis(1500)).unwrap(), Some(1500));
        assert_eq!(
            expiry_millis(Duration::from_millis(i64::MAX as u64)).unwrap(),
            Some(i64::MAX as u64)
        );
    }

    #[test]
    fn test_expiry_millis_rejects_out_of_range_ttl() {
        // Would wrap to 384ms with a plain cast
        let result = expiry_millis(Duration::from_secs(18_446_744_073_709_552));
        assert!(matches!(result, Err(Error::Store(_))));

        let result = expiry_millis(Duration::from_millis(i64::MAX as u64 + 1));
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let result = RedisStore::connect(&Config::new(" ")).await;
        assert!(matches!(result, Err(Error::Config(_))));

        let result = RedisStore::connect(&Config::default().with_scan_page_size(0)).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result = RedisStore::connect(&Config::new("not-a-redis-url")).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn test_store_error_names_operation() {
        let err = store_error("GET")(RedisError::from((redis::ErrorKind::IoError, "broken pipe")));
        assert!(err.to_string().starts_with("store: Redis GET error:"));
    }
}
