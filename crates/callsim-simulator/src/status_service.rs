//! Call lifecycle simulation and status delivery.

use std::{sync::Arc, time::Duration};

use callsim_core::{Call, Clock};
use callsim_delivery::{DeliveryReceipt, OutcomeSink, StatsSnapshot, Transport};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::{
    calls::CallRegistry, config::SimulatorConfig, error::Result, generator::RecordGenerator,
    pusher::RecordPusher,
};

/// Summary of one advancement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Calls moved to their next stage.
    pub advanced: usize,
    /// Ended calls removed.
    pub purged: usize,
    /// Status pushes that failed permanently.
    pub failed: usize,
}

/// Owns the active calls and pushes a status record for every transition.
///
/// Advancement passes and call starts are serialized, so the statuses of
/// one call are delivered strictly in lifecycle order.
#[derive(Debug)]
pub struct CallStatusService {
    generator: RecordGenerator,
    registry: CallRegistry,
    pusher: RecordPusher,
    clock: Arc<dyn Clock>,
    pass_lock: tokio::sync::Mutex<()>,
}

impl CallStatusService {
    /// Creates the service and its delivery pool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the worker count is 0.
    pub fn new(
        config: &SimulatorConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn OutcomeSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            generator: RecordGenerator::new(config.account.clone(), clock.clone()),
            registry: CallRegistry::new(),
            pusher: RecordPusher::new(
                config.status_url.clone(),
                config.workers,
                transport,
                config.retry_policy.clone(),
                sink,
                clock.clone(),
            )?,
            clock,
            pass_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates a call in the `Calling` stage and pushes its first status.
    ///
    /// Runs under the pass lock, so no pass can advance the call before its
    /// `Calling` status was delivered. The call stays active even when the
    /// push fails.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCall` on an identifier collision, otherwise the
    /// terminal delivery error of the initial push.
    pub async fn start_new_call(&self) -> Result<DeliveryReceipt> {
        let _pass = self.pass_lock.lock().await;

        let call = Call::new(self.generator.call_identity(), self.clock.now_utc());
        let status = self.registry.insert(call)?;
        debug!(call_id = %status.call_id, "call started");

        self.pusher.push(&status.call_id, &status).await.inspect_err(|e| {
            warn!(call_id = %status.call_id, error = %e, "initial status push failed");
        })
    }

    /// Advances every active call by one stage and pushes the new statuses.
    ///
    /// Calls already `Ended` are removed without a push. Failed pushes are
    /// logged and counted; they never abort the pass.
    pub async fn advance_all(&self) -> AdvanceReport {
        let _pass = self.pass_lock.lock().await;

        let pass = self.registry.advance_all(self.clock.now_utc());
        let pushes = pass.advanced.iter().map(|status| async move {
            let result = self.pusher.push(&status.call_id, status).await;
            if let Err(e) = &result {
                warn!(
                    call_id = %status.call_id,
                    event_type = %status.event_type,
                    url = %self.pusher.url(),
                    error = %e,
                    "status push failed"
                );
            }
            result.is_err()
        });
        let failed = join_all(pushes).await.into_iter().filter(|failed| *failed).count();

        let report =
            AdvanceReport { advanced: pass.advanced.len(), purged: pass.purged.len(), failed };
        if report.advanced > 0 || report.purged > 0 {
            debug!(
                advanced = report.advanced,
                purged = report.purged,
                failed = report.failed,
                "advancement pass complete"
            );
        }
        report
    }

    /// Number of calls not yet purged.
    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    /// Read access to the active calls.
    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    /// Delivery counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.pusher.stats()
    }

    /// Drains the delivery pool.
    ///
    /// # Errors
    ///
    /// Returns the pool's shutdown error.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        info!(active_calls = self.active_calls(), "stopping call status service");
        self.pusher.shutdown(timeout).await
    }
}
