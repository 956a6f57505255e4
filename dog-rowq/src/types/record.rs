use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobId;

/// A job row as read back from the row store, payload still encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Row id, defines FIFO order
    pub id: JobId,

    /// Encoded payload text
    pub payload: String,

    /// Creation timestamp as written by the store (informational)
    pub enqueued_at: String,

    /// Whether a consumer currently holds a lease
    pub claimed: bool,

    /// Lease expiry while claimed, "not eligible before" after a nack
    pub claim_expires: Option<DateTime<Utc>>,

    /// Number of negative acknowledgements so far
    pub retries: u32,
}

impl JobRecord {
    /// Build a record from raw column values.
    ///
    /// `claim_expires_ms` is Unix epoch milliseconds as stored in the
    /// `claim_expires` column.
    pub fn from_columns(
        id: i64,
        payload: String,
        enqueued_at: String,
        claimed: i64,
        claim_expires_ms: Option<i64>,
        retries: i64,
    ) -> Self {
        Self {
            id: JobId(id),
            payload,
            enqueued_at,
            claimed: claimed != 0,
            claim_expires: claim_expires_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
            retries: u32::try_from(retries.max(0)).unwrap_or(u32::MAX),
        }
    }

    /// Check if the record is past the retry ceiling
    pub fn is_dead_lettered(&self, max_retries: u32) -> bool {
        self.retries > max_retries
    }

    /// Check if the record could be claimed at `now` under `max_retries`
    pub fn is_eligible(&self, now: DateTime<Utc>, max_retries: u32) -> bool {
        if self.is_dead_lettered(max_retries) {
            return false;
        }
        match (self.claimed, self.claim_expires) {
            (false, None) => true,
            (_, Some(expires)) => expires <= now,
            (true, None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(claimed: bool, expires_ms: Option<i64>, retries: i64) -> JobRecord {
        JobRecord::from_columns(
            1,
            "{}".to_string(),
            "2024-01-01T00:00:00.000Z".to_string(),
            claimed as i64,
            expires_ms,
            retries,
        )
    }

    #[test]
    fn test_fresh_record_is_eligible() {
        assert!(record(false, None, 0).is_eligible(Utc::now(), 3));
    }

    #[test]
    fn test_active_lease_is_not_eligible() {
        let future = (Utc::now() + chrono::Duration::seconds(30)).timestamp_millis();
        assert!(!record(true, Some(future), 0).is_eligible(Utc::now(), 3));
    }

    #[test]
    fn test_expired_lease_is_eligible_without_sweep() {
        let past = (Utc::now() - chrono::Duration::seconds(1)).timestamp_millis();
        assert!(record(true, Some(past), 0).is_eligible(Utc::now(), 3));
    }

    #[test]
    fn test_backoff_window_blocks_until_elapsed() {
        let future = (Utc::now() + chrono::Duration::seconds(5)).timestamp_millis();
        let rec = record(false, Some(future), 1);
        assert!(!rec.is_eligible(Utc::now(), 3));
        assert!(rec.is_eligible(Utc::now() + chrono::Duration::seconds(6), 3));
    }

    #[test]
    fn test_dead_letter_excludes_record() {
        let rec = record(false, None, 2);
        assert!(rec.is_dead_lettered(1));
        assert!(!rec.is_eligible(Utc::now(), 1));
        assert!(rec.is_eligible(Utc::now(), 2));
    }

    #[test]
    fn test_expiry_column_round_trips_millis() {
        let rec = record(true, Some(1_700_000_000_123), 0);
        assert_eq!(rec.claim_expires.unwrap().timestamp_millis(), 1_700_000_000_123);
        assert!(rec.claimed);
    }
}
