use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-wide transactional boundary in front of the row store.
///
/// The embedded store tolerates a single writer transaction at a time, so
/// every mutating call (and every sweeper tick) holds `exclusive` for the
/// duration of its store round trip, while `size` only needs `shared`.
/// Across processes, correctness rests on the store's conditional updates,
/// not on this gate.
#[derive(Debug, Default)]
pub struct StoreGate {
    lock: RwLock<()>,
}

/// Held while a caller may write to the store
pub type ExclusiveAccess<'a> = RwLockWriteGuard<'a, ()>;

/// Held while a caller only reads from the store
pub type SharedAccess<'a> = RwLockReadGuard<'a, ()>;

impl StoreGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for sole access to the store
    pub async fn exclusive(&self) -> ExclusiveAccess<'_> {
        self.lock.write().await
    }

    /// Wait for read access, concurrent with other readers
    pub async fn shared(&self) -> SharedAccess<'_> {
        self.lock.read().await
    }
}
