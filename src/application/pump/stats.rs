//! Live counters of a running pump.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::dispatch::MessageOutcome;

/// Counters updated by the workers, readable while the pump runs.
#[derive(Debug, Default)]
pub struct PumpStats {
    received: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    dead_lettered: AtomicU64,
    lease_renewals: AtomicU64,
    settle_failures: AtomicU64,
}

/// Point-in-time copy of `PumpStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStatsSnapshot {
    pub received: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub dead_lettered: u64,
    pub lease_renewals: u64,
    pub settle_failures: u64,
}

impl PumpStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &MessageOutcome) {
        let counter = match outcome {
            MessageOutcome::Completed => &self.completed,
            MessageOutcome::Abandoned(_) => &self.abandoned,
            MessageOutcome::DeadLettered(_) => &self.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lease_renewal(&self) {
        self.lease_renewals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settle_failure(&self) {
        self.settle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PumpStatsSnapshot {
        PumpStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            lease_renewals: self.lease_renewals.load(Ordering::Relaxed),
            settle_failures: self.settle_failures.load(Ordering::Relaxed),
        }
    }
}

impl PumpStatsSnapshot {
    /// Messages received but not yet settled.
    pub fn in_flight(&self) -> u64 {
        self.received
            .saturating_sub(self.completed + self.abandoned + self.dead_lettered)
    }
}
