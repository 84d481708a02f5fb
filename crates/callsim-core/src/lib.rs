//! Core domain types for the call activity simulator.
//!
//! Holds the call lifecycle model, the CDR and call-status wire records, and
//! the [`Clock`] abstraction every other crate uses for timestamps and sleeps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{Call, CallId, CallIdentity, CallStatus, Cdr, EventType};
pub use time::{Clock, RealClock, TestClock};
