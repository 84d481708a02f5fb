//! Error types for record delivery.
//!
//! Distinguishes per-attempt failures (which count against the retry budget)
//! from terminal outcomes and from pool lifecycle errors. The retry loop uses
//! [`DeliveryError::is_retryable`] to decide whether another attempt is
//! allowed.

use std::{fmt, time::Duration};

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors produced while delivering records to a collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Connection could not be established or broke mid-request.
    #[error("network connection failed: {message}")]
    NetworkError {
        /// Error message describing the network failure
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// Collector answered with something other than HTTP 200.
    #[error("unexpected status: HTTP {status_code}")]
    UnexpectedStatus {
        /// HTTP status code returned by the collector
        status_code: u16,
    },

    /// Every attempt allowed by the retry policy failed.
    #[error("delivery failed after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Status code of the last response, if any response arrived
        last_status: Option<u16>,
        /// Description of the last failure
        last_error: String,
    },

    /// Record could not be serialized; never retried.
    #[error("failed to serialize record: {message}")]
    Serialization {
        /// Serializer error message
        message: String,
    },

    /// Invalid delivery or retry configuration.
    #[error("invalid delivery configuration: {message}")]
    ConfigurationError {
        /// Configuration error message
        message: String,
    },

    /// Task submitted after the worker pool was shut down.
    #[error("worker pool is closed")]
    PoolClosed,

    /// A pooled task ended without reporting its outcome.
    #[error("pooled task aborted: {message}")]
    TaskAborted {
        /// Reason the task produced no result
        message: String,
    },

    /// Worker task panicked and could not be joined.
    #[error("worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Index of the worker that failed
        worker_id: usize,
        /// Join error description
        error: String,
    },

    /// Pool did not drain within the shutdown timeout.
    #[error("worker pool shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// Timeout that was exceeded
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates an error for a non-200 response.
    pub fn unexpected_status(status_code: u16) -> Self {
        Self::UnexpectedStatus { status_code }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates an aborted task error.
    pub fn task_aborted(message: impl Into<String>) -> Self {
        Self::TaskAborted { message: message.into() }
    }

    /// Whether a failed attempt with this error may be retried.
    ///
    /// Transport failures and non-200 responses are retryable. Serialization,
    /// configuration and pool lifecycle errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::UnexpectedStatus { .. } => {
                true
            },

            Self::RetriesExhausted { .. }
            | Self::Serialization { .. }
            | Self::ConfigurationError { .. }
            | Self::PoolClosed
            | Self::TaskAborted { .. }
            | Self::WorkerPanic { .. }
            | Self::ShutdownTimeout { .. } => false,
        }
    }

    /// HTTP status associated with the failure, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status_code } => Some(*status_code),
            Self::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

/// Coarse failure category used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connectivity or timeout.
    Transport,
    /// Collector responded with a non-200 status.
    Response,
    /// Retry budget used up.
    Exhausted,
    /// Record or configuration problem.
    Input,
    /// Worker pool lifecycle.
    Pool,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::NetworkError { .. } | DeliveryError::Timeout { .. } => Self::Transport,
            DeliveryError::UnexpectedStatus { .. } => Self::Response,
            DeliveryError::RetriesExhausted { .. } => Self::Exhausted,
            DeliveryError::Serialization { .. } | DeliveryError::ConfigurationError { .. } => {
                Self::Input
            },
            DeliveryError::PoolClosed
            | DeliveryError::TaskAborted { .. }
            | DeliveryError::WorkerPanic { .. }
            | DeliveryError::ShutdownTimeout { .. } => Self::Pool,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Response => write!(f, "response"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Input => write!(f, "input"),
            Self::Pool => write!(f, "pool"),
        }
    }
}
