//! Outcome sink that keeps everything in memory.

use std::sync::{Mutex, PoisonError};

use callsim_delivery::{AttemptOutcome, OutcomeSink};

/// Captures every recorded outcome for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    outcomes: Mutex<Vec<AttemptOutcome>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All outcomes in the order they were recorded.
    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of outcomes recorded.
    pub fn len(&self) -> usize {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, outcome: AttemptOutcome) {
        self.outcomes.lock().unwrap_or_else(PoisonError::into_inner).push(outcome);
    }
}
