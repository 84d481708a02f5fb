//! Error types for the simulation services.

use callsim_core::CallId;
use callsim_delivery::DeliveryError;
use thiserror::Error;

/// Result type alias for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Errors surfaced by the CDR and call-status services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    /// Delivery of a record failed or the pool rejected it.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// A call with this identifier is already active.
    #[error("call {call_id} is already active")]
    DuplicateCall {
        /// Identifier that collided
        call_id: CallId,
    },
}
