//! Typed configuration consumed by the simulation services.

use std::time::Duration;

use callsim_delivery::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Account every simulated record is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    /// Account identifier.
    pub account_id: String,
    /// Service type code.
    pub service_type: i32,
}

/// Settings shared by the CDR and call-status services.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Account attribution for generated records.
    pub account: AccountProfile,
    /// Collector endpoint for CDRs.
    pub cdr_url: String,
    /// Collector endpoint for call status events.
    pub status_url: String,
    /// Worker count of each service's delivery pool.
    pub workers: usize,
    /// Retry schedule for every push.
    pub retry_policy: RetryPolicy,
    /// Time allowed for a pool to drain on shutdown.
    pub shutdown_timeout: Duration,
}

/// Periods of the driver tickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Delay between CDR pushes of one CDR ticker.
    pub cdr_interval: Duration,
    /// Delay between advancement passes of one advance ticker.
    pub status_interval: Duration,
    /// Delay between new simulated calls.
    pub new_call_interval: Duration,
    /// Number of concurrent CDR tickers.
    pub cdr_tickers: usize,
    /// Number of concurrent advance tickers.
    pub advance_tickers: usize,
}

impl DriverConfig {
    /// Ticker layout for `workers` pool workers: one CDR ticker per worker
    /// and two advance tickers per worker.
    pub fn for_workers(
        workers: usize,
        cdr_interval: Duration,
        status_interval: Duration,
        new_call_interval: Duration,
    ) -> Self {
        Self {
            cdr_interval,
            status_interval,
            new_call_interval,
            cdr_tickers: workers,
            advance_tickers: workers * 2,
        }
    }
}
