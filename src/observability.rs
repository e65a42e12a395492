//! Hooks for observing property cache behavior.

use crate::key::GlobalPropertyId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Receives cache events from a [`ChainedProps`](crate::ChainedProps)
/// instance. Every method defaults to a no-op.
///
/// Called synchronously; implementations must not read properties of the
/// instance that reports to them.
pub trait PropMetrics: Send + Sync {
    fn record_hit(&self, _id: &GlobalPropertyId, _duration: Duration) {}

    /// A property was computed.
    fn record_miss(&self, _id: &GlobalPropertyId, _duration: Duration) {}

    /// A cached value was dropped.
    fn record_invalidation(&self, _id: &GlobalPropertyId) {}

    fn record_error(&self, _id: &GlobalPropertyId, _error: &str) {}
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl PropMetrics for NoOpMetrics {}

/// Counts events with atomics.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    errors: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl PropMetrics for CountingMetrics {
    fn record_hit(&self, _id: &GlobalPropertyId, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _id: &GlobalPropertyId, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidation(&self, _id: &GlobalPropertyId) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, _id: &GlobalPropertyId, _error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_metrics() {
        let metrics = CountingMetrics::new();
        let id = GlobalPropertyId::new("C", "p");

        metrics.record_hit(&id, Duration::from_millis(1));
        metrics.record_hit(&id, Duration::from_millis(1));
        metrics.record_miss(&id, Duration::from_millis(2));
        metrics.record_invalidation(&id);
        metrics.record_error(&id, "boom");

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.invalidations(), 1);
        assert_eq!(metrics.errors(), 1);
    }

    #[test]
    fn test_noop_metrics_accepts_events() {
        let metrics: Box<dyn PropMetrics> = Box::new(NoOpMetrics);
        metrics.record_hit(&GlobalPropertyId::new("C", "p"), Duration::ZERO);
    }
}
