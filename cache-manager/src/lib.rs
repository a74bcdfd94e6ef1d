// cache-manager/src/lib.rs
pub mod codec;
pub mod coordinator;
pub mod key;
pub mod ports;

pub use codec::{Codec, JsonCodec};
pub use coordinator::{CacheCoordinator, InvalidationSummary};
pub use key::{DerivedKey, Describe, KeyBuilder, TypeDescriptor};
pub use ports::{KeyStream, KeyValueStore};
pub use shared::{Error, Result};
