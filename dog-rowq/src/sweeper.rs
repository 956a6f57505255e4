use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::{
    backend::{RowStore, MAX_HOLD},
    gate::StoreGate,
    observability::QueueMetrics,
    JobId, QueueResult,
};

/// Shortest pause between sweeps, whatever the lease duration
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Background reclaim of expired leases.
///
/// Claims already treat an expired lease as eligible, so the sweep only
/// tidies `claimed`/`claim_expires` for inspection and size reporting.
pub struct LeaseSweeper {
    store: Arc<dyn RowStore>,
    gate: Arc<StoreGate>,
    metrics: Arc<QueueMetrics>,
}

impl LeaseSweeper {
    pub fn new(store: Arc<dyn RowStore>, gate: Arc<StoreGate>, metrics: Arc<QueueMetrics>) -> Self {
        Self {
            store,
            gate,
            metrics,
        }
    }

    /// Run one sweep under the exclusive gate
    pub async fn sweep_once(&self) -> QueueResult<Vec<JobId>> {
        let reclaimed = {
            let _access = self.gate.exclusive().await;
            self.store.reclaim_expired().await?
        };

        self.metrics.record_reclaimed(reclaimed.len());
        for id in &reclaimed {
            info!(job_id = %id, "Reclaimed expired lease");
        }

        Ok(reclaimed)
    }

    /// Start sweeping every `interval` on the current runtime
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let token = CancellationToken::new();
        let (interval_tx, interval_rx) = watch::channel(interval);

        let join = tokio::spawn(self.run(token.clone(), interval_rx));

        SweeperHandle {
            token: token.clone(),
            interval_tx,
            join: Mutex::new(Some(join)),
            _guard: token.drop_guard(),
        }
    }

    async fn run(self, token: CancellationToken, mut interval_rx: watch::Receiver<Duration>) {
        debug!(location = %self.store.location(), "Starting lease sweeper");

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.sweep_once().await {
                Ok(reclaimed) if reclaimed.is_empty() => debug!("No expired leases found"),
                Ok(_) => {}
                Err(e) => warn!("Error during lease sweep: {}", e),
            }

            let period = (*interval_rx.borrow_and_update()).clamp(MIN_SWEEP_INTERVAL, MAX_HOLD);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Lease sweeper stopped");
    }
}

/// Owner of a running sweeper task. Dropping it stops the task.
pub struct SweeperHandle {
    token: CancellationToken,
    interval_tx: watch::Sender<Duration>,
    join: Mutex<Option<JoinHandle<()>>>,
    _guard: DropGuard,
}

impl SweeperHandle {
    /// Change the pause between sweeps; takes effect immediately
    pub fn set_interval(&self, interval: Duration) {
        self.interval_tx.send_replace(interval);
    }

    /// Current pause between sweeps
    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stop the task and wait for an in-flight sweep to finish
    pub async fn shutdown(&self) {
        self.token.cancel();
        let join = self.join.lock().take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                warn!("Lease sweeper task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{sqlite::SqliteStore, ClaimAttempt};
    use crate::{JobRecord, QueueError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// Sqlite store whose first `failures` reclaim calls fail
    struct FlakyStore {
        inner: SqliteStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl RowStore for FlakyStore {
        async fn insert(&self, payload: &str) -> QueueResult<JobId> {
            self.inner.insert(payload).await
        }

        async fn try_claim(&self, max_retries: u32, lease: Duration) -> QueueResult<ClaimAttempt> {
            self.inner.try_claim(max_retries, lease).await
        }

        async fn ack(&self, id: JobId) -> QueueResult<()> {
            self.inner.ack(id).await
        }

        async fn nack(&self, id: JobId, delay: Duration) -> QueueResult<()> {
            self.inner.nack(id, delay).await
        }

        async fn size(&self, max_retries: u32) -> QueueResult<u64> {
            self.inner.size(max_retries).await
        }

        async fn reclaim_expired(&self) -> QueueResult<Vec<JobId>> {
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(QueueError::storage("reclaiming expired leases", "store unavailable"));
            }
            self.inner.reclaim_expired().await
        }

        async fn record(&self, id: JobId) -> QueueResult<Option<JobRecord>> {
            self.inner.record(id).await
        }

        fn location(&self) -> &str {
            self.inner.location()
        }
    }

    async fn setup() -> (Arc<dyn RowStore>, LeaseSweeper, Arc<QueueMetrics>) {
        let store: Arc<dyn RowStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let metrics = Arc::new(QueueMetrics::new());
        let sweeper = LeaseSweeper::new(store.clone(), Arc::new(StoreGate::new()), metrics.clone());
        (store, sweeper, metrics)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_sweep_releases_expired_lease() {
        let (store, sweeper, metrics) = setup().await;
        let id = store.insert("1").await.unwrap();
        store.try_claim(10, Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let reclaimed = sweeper.sweep_once().await.unwrap();

        assert_eq!(reclaimed, vec![id]);
        assert_eq!(metrics.leases_reclaimed(), 1);
        assert!(!store.record(id).await.unwrap().unwrap().claimed);
        assert!(logs_contain("Reclaimed expired lease"));
    }

    #[tokio::test]
    async fn test_sweep_leaves_live_lease_alone() {
        let (store, sweeper, metrics) = setup().await;
        let id = store.insert("1").await.unwrap();
        store.try_claim(10, Duration::from_secs(60)).await.unwrap();

        assert!(sweeper.sweep_once().await.unwrap().is_empty());
        assert_eq!(metrics.leases_reclaimed(), 0);
        assert!(store.record(id).await.unwrap().unwrap().claimed);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_until_shutdown() {
        let (store, sweeper, metrics) = setup().await;
        let handle = sweeper.spawn(Duration::from_millis(20));
        assert!(handle.is_running());

        let id = store.insert("1").await.unwrap();
        store.try_claim(10, Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!store.record(id).await.unwrap().unwrap().claimed);
        assert_eq!(metrics.leases_reclaimed(), 1);

        handle.shutdown().await;
        assert!(!handle.is_running());
        // Second shutdown is a no-op.
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_interval_can_be_retuned() {
        let (_store, sweeper, _metrics) = setup().await;
        let handle = sweeper.spawn(Duration::from_secs(30));

        handle.set_interval(Duration::from_millis(50));
        assert_eq!(handle.interval(), Duration::from_millis(50));

        handle.shutdown().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_sweeper_keeps_running_after_store_errors() {
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::in_memory().await.unwrap(),
            failures: AtomicUsize::new(2),
        });
        let metrics = Arc::new(QueueMetrics::new());
        let sweeper = LeaseSweeper::new(store.clone(), Arc::new(StoreGate::new()), metrics.clone());

        let id = store.insert("1").await.unwrap();
        store.try_claim(10, Duration::from_millis(1)).await.unwrap();

        let handle = sweeper.spawn(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(logs_contain("Error during lease sweep"));
        assert!(handle.is_running());
        assert_eq!(store.failures.load(Ordering::SeqCst), 0);
        assert!(!store.record(id).await.unwrap().unwrap().claimed);
        assert_eq!(metrics.leases_reclaimed(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_huge_interval_is_clamped() {
        let (_store, sweeper, _metrics) = setup().await;
        let handle = sweeper.spawn(Duration::MAX);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
