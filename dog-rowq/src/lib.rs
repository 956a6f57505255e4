//! # dog-rowq: Durable Job Queue on a Row Store
//!
//! **At-least-once delivery with leases, retry backoff and dead-lettering**
//!
//! dog-rowq keeps jobs as rows in a transactional store: an embedded SQLite
//! file for a single host, or a networked libSQL replica (Turso) shared by
//! many processes. No broker is involved.
//!
//! ## Guarantees
//!
//! - **FIFO by id**: among jobs eligible at the same time, the oldest is claimed first
//! - **Leases**: a claim holds a job for the lease duration; if it is neither
//!   acked nor nacked by then, any consumer may take it again
//! - **Retry backoff**: `nack` holds a job back for `backoff + random jitter`
//! - **Dead-lettering**: jobs nacked more than `max_retries` times are never
//!   claimed or counted again
//! - **At most one active lease per job**: claims are a single transaction with
//!   a conditional update, so two consumers never hold the same job at once
//!
//! ## Quick Start
//!
//! ```no_run
//! use dog_rowq::prelude::*;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct SendEmail {
//!     to: String,
//! }
//!
//! # async fn run() -> QueueResult<()> {
//! let queue = Queue::<SendEmail>::open_local("emails")
//!     .await?
//!     .with_retry_backoff(Duration::from_secs(10))
//!     .with_max_retries(5);
//!
//! queue.insert(&SendEmail { to: "ops@example.com".into() }).await?;
//!
//! while let Some(event) = queue.next().await? {
//!     println!("sending to {}", event.content.to);
//!     queue.ack(event.id).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The remote store is behind the `remote` cargo feature and is configured
//! from `TURSO_URL`, `TURSO_AUTH_TOKEN` and `TURSO_REMOTE_ENCRYPTION_KEY`.

pub mod types;
pub mod error;
pub mod config;
pub mod codec;
pub mod backend;
pub mod retry;
pub mod claim;
pub mod gate;
pub mod sweeper;
pub mod observability;
pub mod queue;

pub use types::{Event, JobId, JobRecord};
pub use error::{QueueError, QueueResult};
pub use config::{LocalConfig, QueueConfig, RemoteConfig};
pub use codec::PayloadCodec;
pub use codec::json::JsonCodec;
pub use backend::{ClaimAttempt, RowStore};
pub use backend::sqlite::SqliteStore;
pub use retry::RetryPolicy;
pub use observability::{MetricsSnapshot, QueueMetrics};
pub use queue::Queue;

#[cfg(feature = "remote")]
pub use backend::remote::RemoteStore;

/// Everything needed to produce and consume jobs
pub mod prelude {
    pub use crate::{Event, JobId, Queue, QueueConfig, QueueError, QueueResult};

    pub use crate::{LocalConfig, RemoteConfig};

    // Custom stores and codecs
    pub use crate::{JsonCodec, PayloadCodec, RowStore};
}
