use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Decode pipeline counters.
///
/// All operations use `Ordering::Relaxed`; snapshots may tear across
/// fields, which is fine for observability.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    enqueued: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    stale: AtomicU64,
    undefined: AtomicU64,
    evicted: AtomicU64,
    worker_starts: AtomicU64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_undefined(&self) {
        self.undefined.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_worker_start(&self) {
        self.worker_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            undefined: self.undefined.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            worker_starts: self.worker_starts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub decoded: u64,
    pub failed: u64,
    pub panicked: u64,
    pub stale: u64,
    pub undefined: u64,
    pub evicted: u64,
    pub worker_starts: u64,
}
