//! Delivery counters shared across pooled tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free delivery counters.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    permanent_failures: AtomicU64,
}

impl DeliveryStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_permanent_failure(&self) {
        self.permanent_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            permanent_failures: self.permanent_failures.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`DeliveryStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// HTTP attempts made, including retries.
    pub attempts: u64,
    /// Records accepted with HTTP 200.
    pub successes: u64,
    /// Records dropped after exhausting retries or failing permanently.
    pub permanent_failures: u64,
}
