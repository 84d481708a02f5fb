//! Call activity simulation.
//!
//! Composes record generation, the call lifecycle state machine and pooled
//! delivery into two services:
//!
//! - [`CdrService`] generates completed-call records and pushes them.
//! - [`CallStatusService`] owns the active calls, advances each one stage
//!   per pass and pushes a status record for every transition.
//!
//! [`driver::spawn_tickers`] runs both on fixed intervals until cancelled.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calls;
pub mod cdr_service;
pub mod config;
pub mod driver;
pub mod error;
pub mod generator;
pub mod pusher;
pub mod status_service;

pub use calls::{AdvancePass, CallRegistry};
pub use cdr_service::CdrService;
pub use config::{AccountProfile, DriverConfig, SimulatorConfig};
pub use driver::spawn_tickers;
pub use error::{Result, SimulatorError};
pub use generator::RecordGenerator;
pub use pusher::RecordPusher;
pub use status_service::{AdvanceReport, CallStatusService};
