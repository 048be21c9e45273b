//! Event handler metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Event handler metrics.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    /// Events appended at the tail.
    pub events_enqueued: AtomicU64,

    /// Events prepended at the head, timeouts included.
    pub events_enqueued_oob: AtomicU64,

    /// Events handed to a registered dispatcher.
    pub events_dispatched: AtomicU64,

    /// Timeout events handed to the timeout dispatcher.
    pub timeouts_dispatched: AtomicU64,

    /// Events discarded by a clear.
    pub events_cleared: AtomicU64,

    /// Worker thread starts.
    pub starts: AtomicU64,

    /// Worker thread stops.
    pub stops: AtomicU64,

    /// Total time spent inside dispatchers (microseconds).
    pub dispatch_time_us: AtomicU64,
}

impl HandlerMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued_oob(&self) {
        self.events_enqueued_oob.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self, duration_us: u64) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        self.dispatch_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self, duration_us: u64) {
        self.timeouts_dispatched.fetch_add(1, Ordering::Relaxed);
        self.dispatch_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub(crate) fn record_cleared(&self, count: usize) {
        self.events_cleared.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stop(&self) {
        self.stops.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_enqueued_oob: self.events_enqueued_oob.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            timeouts_dispatched: self.timeouts_dispatched.load(Ordering::Relaxed),
            events_cleared: self.events_cleared.load(Ordering::Relaxed),
            starts: self.starts.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            dispatch_time_us: self.dispatch_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_enqueued: u64,
    pub events_enqueued_oob: u64,
    pub events_dispatched: u64,
    pub timeouts_dispatched: u64,
    pub events_cleared: u64,
    pub starts: u64,
    pub stops: u64,
    pub dispatch_time_us: u64,
}

impl MetricsSnapshot {
    /// Average time per dispatch, timeouts included, in microseconds.
    pub fn avg_dispatch_time_us(&self) -> f64 {
        let dispatches = self.events_dispatched + self.timeouts_dispatched;
        if dispatches == 0 {
            return 0.0;
        }
        self.dispatch_time_us as f64 / dispatches as f64
    }

    /// Events enqueued but neither dispatched nor cleared, timeouts included.
    pub fn outstanding(&self) -> u64 {
        (self.events_enqueued + self.events_enqueued_oob).saturating_sub(
            self.events_dispatched + self.timeouts_dispatched + self.events_cleared,
        )
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
