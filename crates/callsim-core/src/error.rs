//! Error types for domain model conversions.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while decoding domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Wire code outside the 1-4 lifecycle range.
    #[error("invalid call event type code: {0}")]
    InvalidEventType(u8),
}
