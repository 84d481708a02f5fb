//! Record delivery for the call simulator.
//!
//! Outbound delivery is split into three layers:
//!
//! 1. **[`WorkerPool`]** caps concurrency with `n` workers and a bounded
//!    queue of `2n` tasks; a full queue suspends the submitter.
//! 2. **[`RetryingDelivery`]** runs one record through a bounded retry loop
//!    driven by an explicit [`RetryPolicy`] delay schedule.
//! 3. **[`Transport`]** performs a single POST. [`HttpTransport`] is the
//!    `reqwest` implementation.
//!
//! Every attempt is reported to an [`OutcomeSink`]; [`FileOutcomeLog`]
//! writes them to size-rotated text files.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use callsim_core::{CallId, RealClock};
//! use callsim_delivery::{
//!     DeliveryTask, HttpTransport, NoOpOutcomeSink, RetryPolicy, RetryingDelivery, WorkerPool,
//! };
//!
//! # async fn example() -> callsim_delivery::Result<()> {
//! let policy = RetryPolicy::new(3, vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)])?;
//! let delivery = RetryingDelivery::new(
//!     Arc::new(HttpTransport::with_defaults()?),
//!     policy,
//!     Arc::new(NoOpOutcomeSink),
//!     Arc::new(RealClock::new()),
//! );
//! let pool = WorkerPool::new(4)?;
//!
//! let task = DeliveryTask::new(CallId::new("NM1"), "http://collector/cdr", r#"{"callId":"NM1"}"#);
//! let receipt = pool.execute(async move { delivery.deliver(&task).await }).await??;
//! assert_eq!(receipt.status_code, 200);
//!
//! pool.shutdown(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod outcome;
pub mod retry;
pub mod stats;
pub mod task;
pub mod worker_pool;

pub use client::{ClientConfig, HttpTransport, Transport, TransportResponse};
pub use error::{DeliveryError, ErrorCategory, Result};
pub use outcome::{
    AttemptOutcome, FileOutcomeLog, LogStream, NoOpOutcomeSink, OutcomeSink,
    DEFAULT_MAX_FILE_BYTES,
};
pub use retry::{DeliveryReceipt, RetryPolicy, RetryingDelivery};
pub use stats::{DeliveryStats, StatsSnapshot};
pub use task::DeliveryTask;
pub use worker_pool::WorkerPool;

/// Default shutdown drain timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
