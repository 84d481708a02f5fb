//! Serialize-then-deliver through a pooled worker.

use std::{sync::Arc, time::Duration};

use callsim_core::{CallId, Clock};
use callsim_delivery::{
    DeliveryReceipt, DeliveryTask, OutcomeSink, RetryPolicy, RetryingDelivery, StatsSnapshot,
    Transport, WorkerPool,
};
use serde::Serialize;

use crate::error::Result;

/// Delivers records to one collector endpoint.
///
/// `push` looks synchronous to its caller: it resolves once the pooled
/// retry loop has produced its single final outcome.
#[derive(Debug)]
pub struct RecordPusher {
    url: String,
    pool: WorkerPool,
    delivery: Arc<RetryingDelivery>,
}

impl RecordPusher {
    /// Creates a pusher with its own pool of `workers` executors.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `workers` is 0.
    pub fn new(
        url: impl Into<String>,
        workers: usize,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sink: Arc<dyn OutcomeSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            pool: WorkerPool::new(workers)?,
            delivery: Arc::new(RetryingDelivery::new(transport, policy, sink, clock)),
        })
    }

    /// Collector endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Serializes `record` and delivers it on a pooled worker.
    ///
    /// # Errors
    ///
    /// Serialization errors surface before any attempt. Otherwise returns the
    /// terminal delivery error, or `PoolClosed` after shutdown.
    pub async fn push<T: Serialize>(&self, call_id: &CallId, record: &T) -> Result<DeliveryReceipt> {
        let task = DeliveryTask::json(call_id.clone(), self.url.clone(), record)?;
        let delivery = self.delivery.clone();

        let receipt = self.pool.execute(async move { delivery.deliver(&task).await }).await??;
        Ok(receipt)
    }

    /// Delivery counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.delivery.stats().snapshot()
    }

    /// Drains the pool.
    ///
    /// # Errors
    ///
    /// Returns the pool's shutdown error.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.pool.shutdown(timeout).await?;
        Ok(())
    }
}
