//! Test doubles and assertions for deterministic callsim tests.
//!
//! Provides a scripted [`Transport`](callsim_delivery::Transport), an
//! outcome sink that captures every attempt, a wiremock-backed collector and
//! invariant checks for call histories and CDR timelines.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::time::Duration;

use callsim_delivery::RetryPolicy;

pub mod http;
pub mod invariants;
pub mod sink;
pub mod transport;

pub use callsim_core::TestClock;
pub use http::MockCollector;
pub use invariants::{assert_cdr_timeline, assert_history_prefix};
pub use sink::RecordingSink;
pub use transport::{RecordedPost, ScriptedTransport, Step};

/// Retry policy with `times` attempts where attempt `i` waits `i` seconds.
///
/// # Panics
///
/// Panics when `times` is 0.
pub fn test_policy(times: u32) -> RetryPolicy {
    let delays = (0..u64::from(times)).map(Duration::from_secs).collect();
    RetryPolicy::new(times, delays).expect("test policy must be valid")
}
