//! Lock-free counters for broker observability.
//!
//! Relaxed ordering throughout: these only ever count up, and /metrics
//! readers tolerate slightly stale values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct BrokerMetrics {
    pub accepted: AtomicU64,
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub dead_lettered: AtomicU64,
    pub popped: AtomicU64,
    pub incidents_created: AtomicU64,
    pub webhooks_fired: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub popped: u64,
    pub incidents_created: u64,
    pub webhooks_fired: u64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            incidents_created: self.incidents_created.load(Ordering::Relaxed),
            webhooks_fired: self.webhooks_fired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let m = BrokerMetrics::new();
        BrokerMetrics::incr(&m.accepted);
        BrokerMetrics::incr(&m.accepted);
        BrokerMetrics::incr(&m.popped);
        let snap = m.snapshot();
        assert_eq!(snap.accepted, 2);
        assert_eq!(snap.popped, 1);
        assert_eq!(snap.failed, 0);
    }
}
