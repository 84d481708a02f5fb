//! Call detail record delivery.

use std::{sync::Arc, time::Duration};

use callsim_core::{Cdr, Clock};
use callsim_delivery::{DeliveryReceipt, OutcomeSink, StatsSnapshot, Transport};
use tracing::{info, warn};

use crate::{
    config::SimulatorConfig, error::Result, generator::RecordGenerator, pusher::RecordPusher,
};

/// Generates CDRs and pushes them to the CDR collector.
#[derive(Debug)]
pub struct CdrService {
    generator: RecordGenerator,
    pusher: RecordPusher,
}

impl CdrService {
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
            pusher: RecordPusher::new(
                config.cdr_url.clone(),
                config.workers,
                transport,
                config.retry_policy.clone(),
                sink,
                clock,
            )?,
        })
    }

    /// Generates a CDR without delivering it.
    pub fn generate_cdr(&self) -> Cdr {
        self.generator.cdr()
    }

    /// Delivers an already built CDR.
    ///
    /// # Errors
    ///
    /// Returns the terminal delivery error for this record.
    pub async fn push_cdr(&self, cdr: &Cdr) -> Result<DeliveryReceipt> {
        match self.pusher.push(&cdr.call_id, cdr).await {
            Ok(receipt) => {
                info!(call_id = %cdr.call_id, attempts = receipt.attempts, "CDR delivered");
                Ok(receipt)
            },
            Err(e) => {
                warn!(call_id = %cdr.call_id, url = %self.pusher.url(), error = %e, "CDR dropped");
                Err(e)
            },
        }
    }

    /// Generates a fresh CDR and delivers it.
    ///
    /// # Errors
    ///
    /// Returns the terminal delivery error for this record.
    pub async fn push_generated_cdr(&self) -> Result<DeliveryReceipt> {
        let cdr = self.generate_cdr();
        self.push_cdr(&cdr).await
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
        self.pusher.shutdown(timeout).await
    }
}
