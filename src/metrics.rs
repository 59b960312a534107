#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Optional scheduling counters for a pool.
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct PoolMetrics {
    /// Number of compute dispatches, sequential ones included.
    pub dispatches: AtomicU64,
    /// Indices executed by the worker that owned them.
    pub own_claims: AtomicU64,
    /// Indices executed after being stolen from another worker.
    pub steals_success: AtomicU64,
    /// Victims that had nothing left on the first steal attempt.
    pub steals_empty: AtomicU64,
    /// Time when metrics collection started.
    pub start_time: Instant,
}

#[cfg(feature = "metrics")]
impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            dispatches: AtomicU64::new(0),
            own_claims: AtomicU64::new(0),
            steals_success: AtomicU64::new(0),
            steals_empty: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Returns a snapshot of current metrics values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            own_claims: self.own_claims.load(Ordering::Relaxed),
            steals_success: self.steals_success.load(Ordering::Relaxed),
            steals_empty: self.steals_empty.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(feature = "metrics")]
impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub dispatches: u64,
    pub own_claims: u64,
    pub steals_success: u64,
    pub steals_empty: u64,
    pub elapsed_seconds: f64,
}

#[cfg(feature = "metrics")]
impl MetricsSnapshot {
    /// Total number of indices executed.
    pub fn items_executed(&self) -> u64 {
        self.own_claims + self.steals_success
    }

    /// Fraction of executed indices that were stolen.
    pub fn steal_ratio(&self) -> f64 {
        let total = self.items_executed();
        if total > 0 {
            self.steals_success as f64 / total as f64
        } else {
            0.0
        }
    }
}
