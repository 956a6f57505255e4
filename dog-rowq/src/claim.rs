use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::{
    backend::{ClaimAttempt, RowStore},
    codec::PayloadCodec,
    config::QueueConfig,
    observability::QueueMetrics,
    Event, QueueResult,
};

/// Turns one store claim into a typed event.
///
/// The caller is expected to hold the store gate exclusively for the call.
pub struct ClaimEngine<'a, C> {
    store: &'a dyn RowStore,
    codec: &'a C,
    metrics: &'a QueueMetrics,
}

impl<'a, C: PayloadCodec> ClaimEngine<'a, C> {
    pub fn new(store: &'a dyn RowStore, codec: &'a C, metrics: &'a QueueMetrics) -> Self {
        Self {
            store,
            codec,
            metrics,
        }
    }

    /// Lease the oldest eligible job and decode its payload.
    ///
    /// Returns `Ok(None)` when nothing is eligible or the candidate was taken
    /// by another consumer between scan and update. A payload that fails to
    /// decode stays claimed and comes back once its lease expires.
    pub async fn next<T: DeserializeOwned>(
        &self,
        config: &QueueConfig,
    ) -> QueueResult<Option<Event<T>>> {
        let record = match self
            .store
            .try_claim(config.max_retries, config.lease_duration)
            .await?
        {
            ClaimAttempt::Claimed(record) => record,
            ClaimAttempt::Empty => return Ok(None),
            ClaimAttempt::Contended => {
                self.metrics.record_contended();
                debug!("Claim lost to a concurrent consumer");
                return Ok(None);
            }
        };

        self.metrics.record_claimed();

        match self.codec.decode::<T>(&record.payload) {
            Ok(content) => Ok(Some(Event::new(record.id, content))),
            Err(e) => {
                self.metrics.record_decode_failure();
                error!(job_id = %record.id, codec = self.codec.codec_id(), "Failed to decode claimed job: {}", e);
                Err(e)
            }
        }
    }
}
