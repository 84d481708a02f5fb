//! Bounded retry with an explicit per-attempt delay schedule.
//!
//! Attempt 0 fires immediately; attempt `i > 0` first sleeps `delays[i]`.
//! Every attempt is reported to the outcome sink, successful or not.

use std::{sync::Arc, time::Duration};

use callsim_core::Clock;
use tracing::{debug, warn};

use crate::{
    client::Transport,
    error::{DeliveryError, ErrorCategory, Result},
    outcome::{AttemptOutcome, OutcomeSink},
    stats::DeliveryStats,
    task::DeliveryTask,
};

/// Number of attempts and the wait before each of them.
///
/// `delays[0]` belongs to the immediate first attempt and is never slept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    times: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a validated policy.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` when `times` is 0 or the
    /// schedule has fewer than `times` entries.
    pub fn new(times: u32, delays: Vec<Duration>) -> Result<Self> {
        if times == 0 {
            return Err(DeliveryError::configuration("retry times must be at least 1"));
        }
        if delays.len() < times as usize {
            return Err(DeliveryError::configuration(format!(
                "retry schedule has {} delays but {times} attempts need {times}",
                delays.len()
            )));
        }
        Ok(Self { times, delays })
    }

    /// Policy that makes a single attempt.
    pub fn single_attempt() -> Self {
        Self { times: 1, delays: vec![Duration::ZERO] }
    }

    /// Maximum number of attempts.
    pub fn times(&self) -> u32 {
        self.times
    }

    /// Full delay schedule.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Wait before attempt `attempt` (zero-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.delays.get(attempt as usize).copied().unwrap_or(Duration::ZERO)
    }
}

/// Successful delivery summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Status of the accepted response.
    pub status_code: u16,
}

/// Retry loop around a [`Transport`].
#[derive(Debug, Clone)]
pub struct RetryingDelivery {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sink: Arc<dyn OutcomeSink>,
    clock: Arc<dyn Clock>,
    stats: Arc<DeliveryStats>,
}

impl RetryingDelivery {
    /// Creates a delivery function with fresh statistics.
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sink: Arc<dyn OutcomeSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { transport, policy, sink, clock, stats: Arc::new(DeliveryStats::new()) }
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Shared delivery counters.
    pub fn stats(&self) -> &Arc<DeliveryStats> {
        &self.stats
    }

    /// Delivers `task`, retrying according to the policy.
    ///
    /// # Errors
    ///
    /// Returns `RetriesExhausted` once every attempt failed, or the
    /// non-retryable error that stopped the loop early.
    pub async fn deliver(&self, task: &DeliveryTask) -> Result<DeliveryReceipt> {
        let mut last_status = None;
        let mut last_error = String::new();

        for attempt in 0..self.policy.times() {
            if attempt > 0 {
                self.clock.sleep(self.policy.delay_before(attempt)).await;
            }

            self.stats.record_attempt();
            let result = self.transport.post(&task.url, task.payload.clone()).await;

            let (status_code, error) = match &result {
                Ok(response) => (Some(response.status_code), None),
                Err(e) => (None, Some(e.to_string())),
            };
            self.sink.record(AttemptOutcome {
                call_id: task.call_id.clone(),
                url: task.url.clone(),
                payload: task.payload.clone(),
                status_code,
                error,
                attempt,
                recorded_at: self.clock.now_utc(),
            });

            match result {
                Ok(response) if response.is_accepted() => {
                    self.stats.record_success();
                    debug!(
                        call_id = %task.call_id,
                        url = %task.url,
                        attempt,
                        duration_ms = response.duration.as_millis(),
                        "record delivered"
                    );
                    return Ok(DeliveryReceipt {
                        attempts: attempt + 1,
                        status_code: response.status_code,
                    });
                },
                Ok(response) => {
                    let error = DeliveryError::unexpected_status(response.status_code);
                    warn!(
                        call_id = %task.call_id,
                        url = %task.url,
                        attempt,
                        status_code = response.status_code,
                        "delivery attempt rejected"
                    );
                    last_status = Some(response.status_code);
                    last_error = error.to_string();
                },
                Err(error) if !error.is_retryable() => {
                    self.stats.record_permanent_failure();
                    warn!(
                        call_id = %task.call_id,
                        url = %task.url,
                        attempt,
                        category = %ErrorCategory::from(&error),
                        error = %error,
                        "delivery failed permanently"
                    );
                    return Err(error);
                },
                Err(error) => {
                    warn!(
                        call_id = %task.call_id,
                        url = %task.url,
                        attempt,
                        category = %ErrorCategory::from(&error),
                        error = %error,
                        "delivery attempt failed"
                    );
                    last_status = None;
                    last_error = error.to_string();
                },
            }
        }

        self.stats.record_permanent_failure();
        Err(DeliveryError::RetriesExhausted {
            attempts: self.policy.times(),
            last_status,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_secs).collect()
    }

    #[test]
    fn schedule_must_cover_every_attempt() {
        assert!(RetryPolicy::new(3, secs(&[0, 1, 2])).is_ok());
        assert!(RetryPolicy::new(3, secs(&[0, 1, 2, 4])).is_ok());

        let short = RetryPolicy::new(3, secs(&[0, 1]));
        assert!(matches!(short, Err(DeliveryError::ConfigurationError { .. })));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let result = RetryPolicy::new(0, secs(&[1]));
        assert!(matches!(result, Err(DeliveryError::ConfigurationError { .. })));
    }

    #[test]
    fn first_attempt_never_waits() {
        let policy = RetryPolicy::new(3, secs(&[9, 2, 5])).unwrap();

        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(2), Duration::from_secs(5));
    }

    #[test]
    fn single_attempt_policy() {
        let policy = RetryPolicy::single_attempt();
        assert_eq!(policy.times(), 1);
        assert_eq!(policy.delay_before(0), Duration::ZERO);
    }
}
