use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for one queue, shared by every clone of its handle
#[derive(Debug, Default)]
pub struct QueueMetrics {
    jobs_inserted: AtomicU64,
    jobs_claimed: AtomicU64,
    jobs_acked: AtomicU64,
    jobs_nacked: AtomicU64,
    leases_reclaimed: AtomicU64,
    claims_contended: AtomicU64,
    decode_failures: AtomicU64,
}

/// Point-in-time copy of `QueueMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub jobs_inserted: u64,
    pub jobs_claimed: u64,
    pub jobs_acked: u64,
    pub jobs_nacked: u64,
    pub leases_reclaimed: u64,
    pub claims_contended: u64,
    pub decode_failures: u64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&self) {
        self.jobs_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claimed(&self) {
        self.jobs_claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acked(&self) {
        self.jobs_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nacked(&self) {
        self.jobs_nacked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reclaimed(&self, count: usize) {
        self.leases_reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_contended(&self) {
        self.claims_contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Getters for individual counters
    pub fn jobs_inserted(&self) -> u64 {
        self.jobs_inserted.load(Ordering::Relaxed)
    }

    pub fn jobs_claimed(&self) -> u64 {
        self.jobs_claimed.load(Ordering::Relaxed)
    }

    pub fn jobs_acked(&self) -> u64 {
        self.jobs_acked.load(Ordering::Relaxed)
    }

    pub fn jobs_nacked(&self) -> u64 {
        self.jobs_nacked.load(Ordering::Relaxed)
    }

    pub fn leases_reclaimed(&self) -> u64 {
        self.leases_reclaimed.load(Ordering::Relaxed)
    }

    pub fn claims_contended(&self) -> u64 {
        self.claims_contended.load(Ordering::Relaxed)
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Copy all counters at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_inserted: self.jobs_inserted(),
            jobs_claimed: self.jobs_claimed(),
            jobs_acked: self.jobs_acked(),
            jobs_nacked: self.jobs_nacked(),
            leases_reclaimed: self.leases_reclaimed(),
            claims_contended: self.claims_contended(),
            decode_failures: self.decode_failures(),
        }
    }
}
