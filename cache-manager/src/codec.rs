use serde::{Serialize, de::DeserializeOwned};
use shared::{Error, Result};

/// Turns items into stored bytes and back. Pluggable per item type.
pub trait Codec<T>: Send + Sync + 'static {
    fn encode(&self, item: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON via serde_json, for any serde type
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, item: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(item).map_err(|e| Error::Encode(format!("Failed to serialize item: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Decode(format!("Failed to deserialize item: {}", e)))
    }
}
