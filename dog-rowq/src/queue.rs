use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

use crate::{
    backend::{sqlite::SqliteStore, RowStore},
    claim::ClaimEngine,
    codec::{json::JsonCodec, PayloadCodec},
    config::{LocalConfig, QueueConfig, RemoteConfig},
    gate::StoreGate,
    observability::QueueMetrics,
    sweeper::{LeaseSweeper, SweeperHandle},
    Event, JobId, QueueResult,
};

/// State shared by every clone of a queue handle
struct Shared {
    store: Arc<dyn RowStore>,
    gate: Arc<StoreGate>,
    metrics: Arc<QueueMetrics>,
    sweeper: SweeperHandle,
}

/// Durable at-least-once queue of `T` values.
///
/// Clones share the store, gate, metrics and sweeper; each clone carries its
/// own [`QueueConfig`]. The sweeper stops once the last clone is dropped or
/// [`Queue::shutdown`] is called.
pub struct Queue<T, C = JsonCodec> {
    shared: Arc<Shared>,
    config: QueueConfig,
    codec: Arc<C>,
    _payload: PhantomData<fn() -> T>,
}

impl<T, C> Clone for Queue<T, C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            config: self.config.clone(),
            codec: self.codec.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T, C> fmt::Debug for Queue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("location", &self.shared.store.location())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Queue<T, JsonCodec>
where
    T: Serialize + DeserializeOwned,
{
    /// Open (or create) `.db/<name>.db` with default settings
    pub async fn open_local(name: &str) -> QueueResult<Self> {
        Self::open_local_with(LocalConfig::new(name), QueueConfig::default()).await
    }

    /// Open (or create) a local queue file
    pub async fn open_local_with(local: LocalConfig, config: QueueConfig) -> QueueResult<Self> {
        let store = SqliteStore::open(&local).await?;
        Ok(Self::from_store(Arc::new(store), config))
    }

    /// Connect to the replica named by `TURSO_URL` with default settings
    pub async fn open_remote() -> QueueResult<Self> {
        Self::open_remote_with(RemoteConfig::from_env()?, QueueConfig::default()).await
    }

    /// Connect to a networked replica
    pub async fn open_remote_with(remote: RemoteConfig, config: QueueConfig) -> QueueResult<Self> {
        #[cfg(feature = "remote")]
        {
            let store = crate::backend::remote::RemoteStore::connect(&remote).await?;
            Ok(Self::from_store(Arc::new(store), config))
        }

        #[cfg(not(feature = "remote"))]
        {
            let _ = (remote, config);
            Err(crate::QueueError::configuration("remote support not compiled in"))
        }
    }

    /// Build a queue over an already opened store.
    ///
    /// Must be called from within a Tokio runtime: the sweeper is spawned here.
    /// Every call creates its own gate and sweeper, so two queues built over
    /// the same store do not share the in-process lock. Use
    /// [`Queue::retyped`] to get another payload type on a shared gate.
    pub fn from_store(store: Arc<dyn RowStore>, config: QueueConfig) -> Self {
        Self::from_parts(store, JsonCodec, config)
    }
}

impl<T, C> Queue<T, C>
where
    T: Serialize + DeserializeOwned,
    C: PayloadCodec,
{
    /// Build a queue with a custom payload codec
    pub fn from_parts(store: Arc<dyn RowStore>, codec: C, config: QueueConfig) -> Self {
        let gate = Arc::new(StoreGate::new());
        let metrics = Arc::new(QueueMetrics::new());
        let sweeper = LeaseSweeper::new(store.clone(), gate.clone(), metrics.clone())
            .spawn(config.lease_duration);

        Self {
            shared: Arc::new(Shared {
                store,
                gate,
                metrics,
                sweeper,
            }),
            config,
            codec: Arc::new(codec),
            _payload: PhantomData,
        }
    }

    /// Handle for payload type `U` on the same store, sharing this queue's
    /// gate, sweeper and metrics
    pub fn retyped<U>(&self) -> Queue<U, C>
    where
        U: Serialize + DeserializeOwned,
    {
        Queue {
            shared: self.shared.clone(),
            config: self.config.clone(),
            codec: self.codec.clone(),
            _payload: PhantomData,
        }
    }

    /// Encode and persist a job, returning its id
    #[instrument(skip(self, value))]
    pub async fn insert(&self, value: &T) -> QueueResult<JobId> {
        let payload = self.codec.encode(value)?;

        let id = {
            let _access = self.shared.gate.exclusive().await;
            self.shared.store.insert(&payload).await?
        };

        self.shared.metrics.record_inserted();
        debug!(job_id = %id, "Inserted job");
        Ok(id)
    }

    /// Claim the oldest eligible job, or `None` if nothing is ready
    #[instrument(skip(self))]
    pub async fn next(&self) -> QueueResult<Option<Event<T>>> {
        let _access = self.shared.gate.exclusive().await;
        let engine = ClaimEngine::new(
            self.shared.store.as_ref(),
            self.codec.as_ref(),
            &self.shared.metrics,
        );

        let event = engine.next::<T>(&self.config).await?;
        if let Some(event) = &event {
            debug!(job_id = %event.id, "Claimed job");
        }
        Ok(event)
    }

    /// Remove a job for good. Acking an unknown id succeeds.
    #[instrument(skip_all, fields(job_id = %id))]
    pub async fn ack(&self, id: JobId) -> QueueResult<()> {
        {
            let _access = self.shared.gate.exclusive().await;
            self.shared.store.ack(id).await?;
        }

        self.shared.metrics.record_acked();
        debug!("Acked job");
        Ok(())
    }

    /// Release a job for a later retry after backoff plus jitter
    #[instrument(skip_all, fields(job_id = %id))]
    pub async fn nack(&self, id: JobId) -> QueueResult<()> {
        let delay = self.config.retry_policy().next_delay();

        {
            let _access = self.shared.gate.exclusive().await;
            self.shared.store.nack(id, delay).await?;
        }

        self.shared.metrics.record_nacked();
        debug!(delay_ms = delay.as_millis() as u64, "Nacked job");
        Ok(())
    }

    /// Number of jobs not yet acked or dead-lettered, claimed or not
    #[instrument(skip(self))]
    pub async fn size(&self) -> QueueResult<u64> {
        let _access = self.shared.gate.shared().await;
        self.shared.store.size(self.config.max_retries).await
    }

    /// Path or URL of the backing store. Never includes credentials.
    pub fn location(&self) -> &str {
        self.shared.store.location()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.shared.metrics
    }

    /// The underlying row store
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.shared.store
    }

    /// Stop the lease sweeper and wait for it to finish
    pub async fn shutdown(&self) {
        self.shared.sweeper.shutdown().await;
    }

    /// Set the retry backoff for this handle
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.config = self.config.with_retry_backoff(backoff);
        self
    }

    /// Set the dead-letter threshold for this handle
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config = self.config.with_max_retries(max_retries);
        self
    }

    /// Set the lease duration for this handle's claims. The shared sweeper
    /// is retuned to the new duration.
    pub fn with_lease_duration(mut self, lease: Duration) -> Self {
        self.config = self.config.with_lease_duration(lease);
        self.shared.sweeper.set_interval(lease);
        self
    }

    /// Set the jitter ceiling for this handle
    pub fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.config = self.config.with_retry_jitter(jitter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueueError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    async fn memory_queue() -> Queue<Ping> {
        let store = SqliteStore::in_memory().await.unwrap();
        Queue::from_store(Arc::new(store), QueueConfig::default())
    }

    #[tokio::test]
    async fn test_setters_are_copy_on_write() {
        let base = memory_queue().await;
        let tuned = base
            .clone()
            .with_max_retries(2)
            .with_retry_backoff(Duration::from_millis(10))
            .with_retry_jitter(Duration::ZERO);

        assert_eq!(base.config().max_retries, 1000);
        assert_eq!(tuned.config().max_retries, 2);
        assert_eq!(tuned.config().retry_backoff, Duration::from_millis(10));
        assert_eq!(tuned.config().retry_jitter, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_clones_share_store_and_metrics() {
        let queue = memory_queue().await;
        let other = queue.clone();

        queue.insert(&Ping { seq: 1 }).await.unwrap();

        assert_eq!(other.size().await.unwrap(), 1);
        assert_eq!(other.metrics().jobs_inserted(), 1);
    }

    #[tokio::test]
    async fn test_retyped_handle_shares_gate_and_sweeper() {
        let queue = memory_queue().await.with_max_retries(7);
        let raw: Queue<serde_json::Value> = queue.retyped();

        assert!(Arc::ptr_eq(&queue.shared, &raw.shared));
        assert_eq!(raw.config().max_retries, 7);

        queue.insert(&Ping { seq: 9 }).await.unwrap();
        let event = raw.next().await.unwrap().unwrap();
        assert_eq!(event.content["seq"], 9);
        assert_eq!(queue.metrics().jobs_claimed(), 1);
    }

    #[tokio::test]
    async fn test_lease_setter_retunes_sweeper() {
        let queue = memory_queue().await.with_lease_duration(Duration::from_millis(250));

        assert_eq!(queue.config().lease_duration, Duration::from_millis(250));
        assert_eq!(queue.shared.sweeper.interval(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_shutdown_stops_sweeper() {
        let queue = memory_queue().await;
        queue.shutdown().await;

        assert!(!queue.shared.sweeper.is_running());
        // Operations still work without the sweeper.
        queue.insert(&Ping { seq: 1 }).await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_location() {
        let queue = memory_queue().await;
        assert_eq!(queue.location(), ":memory:");
        assert!(format!("{:?}", queue).contains(":memory:"));
    }

    #[cfg(not(feature = "remote"))]
    #[tokio::test]
    async fn test_remote_without_feature_is_configuration_error() {
        let err = Queue::<Ping>::open_remote_with(
            RemoteConfig::new("libsql://queue.example.turso.io"),
            QueueConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, QueueError::Configuration(msg) if msg.contains("remote")));
    }
}
