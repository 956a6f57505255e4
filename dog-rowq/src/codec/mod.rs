pub mod json;

use serde::{de::DeserializeOwned, Serialize};

use crate::QueueResult;

/// Encodes caller payloads to the text stored in the `payload` column and back.
///
/// Encoding failures must surface as `QueueError::Serialization` so that
/// `insert` rejects the value before anything touches the store.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Encode a value to its stored text form
    fn encode<T: Serialize>(&self, value: &T) -> QueueResult<String>;

    /// Decode stored text back into a value
    fn decode<T: DeserializeOwned>(&self, text: &str) -> QueueResult<T>;

    /// Get codec identifier
    fn codec_id(&self) -> &'static str;
}
