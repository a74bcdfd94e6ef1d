// storage-engine/src/lib.rs
pub mod moka_store;
pub mod pattern;
pub mod redis_store;

pub use moka_store::MokaStore;
pub use redis_store::RedisStore;

use cache_manager::CacheCoordinator;
use shared::Result;
use shared::config::Config;
use std::sync::Arc;

/// Connect to the store named by `config` and wrap it in a JSON coordinator
pub async fn connect(config: &Config) -> Result<CacheCoordinator> {
    let store = RedisStore::connect(config).await?;
    Ok(CacheCoordinator::new(Arc::new(store)))
}
