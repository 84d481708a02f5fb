//! Unit of work handed to the worker pool.

use bytes::Bytes;
use callsim_core::CallId;
use serde::Serialize;

use crate::error::{DeliveryError, Result};

/// Serialized record plus its destination.
///
/// Built once per push and never mutated; the payload is reference-counted
/// so every attempt and every outcome record share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTask {
    /// Call the record belongs to.
    pub call_id: CallId,
    /// Collector endpoint.
    pub url: String,
    /// JSON body.
    pub payload: Bytes,
}

impl DeliveryTask {
    /// Creates a task from an already serialized payload.
    pub fn new(call_id: CallId, url: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { call_id, url: url.into(), payload: payload.into() }
    }

    /// Serializes `record` to JSON and wraps it in a task.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` when the record cannot be
    /// encoded. No attempt is made in that case.
    pub fn json<T: Serialize>(call_id: CallId, url: impl Into<String>, record: &T) -> Result<Self> {
        let payload =
            serde_json::to_vec(record).map_err(|e| DeliveryError::serialization(e.to_string()))?;
        Ok(Self::new(call_id, url, payload))
    }
}
