pub mod schema;
pub mod sqlite;

#[cfg(feature = "remote")]
pub mod remote;

use async_trait::async_trait;
use std::time::Duration;

use crate::{JobId, JobRecord, QueueResult};

/// Outcome of one scan-and-claim attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimAttempt {
    /// The candidate was leased; the record reflects the new lease
    Claimed(JobRecord),

    /// Nothing was eligible at scan time
    Empty,

    /// A candidate was found but stopped being eligible before the
    /// conditional update ran (another consumer took it)
    Contended,
}

/// Row store primitives the queue is built on.
///
/// Implementations must make `try_claim` a single transaction: the candidate
/// scan and the conditional update either both take effect or neither does.
/// Callers serialize in-process access through `StoreGate`; implementations
/// must not rely on that for cross-process safety.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert an encoded payload, returning the assigned id
    async fn insert(&self, payload: &str) -> QueueResult<JobId>;

    /// Lease the oldest eligible job with `retries <= max_retries` for `lease`
    async fn try_claim(&self, max_retries: u32, lease: Duration) -> QueueResult<ClaimAttempt>;

    /// Delete a job; deleting a missing id succeeds
    async fn ack(&self, id: JobId) -> QueueResult<()>;

    /// Release a job, bump its retry count and hold it back for `delay`
    async fn nack(&self, id: JobId, delay: Duration) -> QueueResult<()>;

    /// Count jobs with `retries <= max_retries`, claimed or not
    async fn size(&self, max_retries: u32) -> QueueResult<u64>;

    /// Clear every claim whose lease has passed, returning the released ids
    async fn reclaim_expired(&self) -> QueueResult<Vec<JobId>>;

    /// Get full job record (optional - for observability/debugging)
    async fn record(&self, id: JobId) -> QueueResult<Option<JobRecord>>;

    /// Where the store lives: file path or endpoint URL, never credentials
    fn location(&self) -> &str;
}

/// Longest lease or backoff a store will record. Larger durations are
/// clamped so `now + hold` stays an integer timestamp chrono can represent.
pub const MAX_HOLD: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Whole milliseconds, clamped to `MAX_HOLD`, for binding durations into
/// statements
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.min(MAX_HOLD).as_millis()).unwrap_or(i64::MAX)
}
