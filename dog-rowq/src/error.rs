use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Boxed source error from a row store driver
pub type StoreSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by queue operations.
///
/// An empty queue is not an error: `Queue::next` returns `Ok(None)`, and a
/// claim lost to a concurrent caller is reported the same way.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A required connection parameter is missing or unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A payload could not be encoded on insert or decoded on claim
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any failure reported by the underlying row store
    #[error("Storage error while {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StoreSource,
    },
}

impl QueueError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Wrap a store error with the operation that produced it
    pub fn storage<E>(op: &'static str, err: E) -> Self
    where
        E: Into<StoreSource>,
    {
        Self::Storage {
            op,
            source: err.into(),
        }
    }

    /// Check if this error came from the row store
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// The operation that failed, for storage errors
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Storage { op, .. } => Some(op),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
