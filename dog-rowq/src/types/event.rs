use serde::{Deserialize, Serialize};

use super::JobId;

/// A successfully claimed job, handed to the consumer until it acks or nacks.
///
/// Events are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    /// Id to pass to `ack` / `nack`
    pub id: JobId,

    /// Decoded payload
    pub content: T,
}

impl<T> Event<T> {
    pub fn new(id: JobId, content: T) -> Self {
        Self { id, content }
    }

    /// Consume the event, keeping only the payload
    pub fn into_content(self) -> T {
        self.content
    }
}
