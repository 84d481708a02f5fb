//! Invariant checks for call histories and generated records.

use anyhow::{ensure, Result};
use callsim_core::{Cdr, EventType};

/// Checks that `history` is a non-empty prefix of the lifecycle order.
pub fn assert_history_prefix(history: &[EventType]) -> Result<()> {
    ensure!(!history.is_empty(), "call history is empty");
    ensure!(
        history.len() <= EventType::LIFECYCLE.len(),
        "call history {history:?} is longer than the lifecycle"
    );
    ensure!(
        history == &EventType::LIFECYCLE[..history.len()],
        "call history {history:?} is not a prefix of {:?}",
        EventType::LIFECYCLE
    );
    Ok(())
}

/// Checks the timeline and duration equations of a CDR.
pub fn assert_cdr_timeline(cdr: &Cdr) -> Result<()> {
    ensure!(
        cdr.begin_call_time <= cdr.ring_time && cdr.ring_time <= cdr.start_time,
        "ring time {} outside setup window [{}, {}]",
        cdr.ring_time,
        cdr.begin_call_time,
        cdr.start_time
    );
    ensure!(
        cdr.start_time <= cdr.end_time,
        "start time {} after end time {}",
        cdr.start_time,
        cdr.end_time
    );
    ensure!(
        cdr.end_time - cdr.start_time == cdr.call_duration * 1000,
        "duration {}s does not match timeline {}ms",
        cdr.call_duration,
        cdr.end_time - cdr.start_time
    );
    ensure!(
        (0..=600).contains(&cdr.call_duration),
        "duration {}s exceeds 600s",
        cdr.call_duration
    );
    ensure!(
        cdr.cdr_create_time >= cdr.end_time,
        "record created at {} before the call ended at {}",
        cdr.cdr_create_time,
        cdr.end_time
    );
    Ok(())
}
