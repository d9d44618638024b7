//! Error taxonomy for the coordination contract.
//!
//! Listener failures are deliberately absent: they are contained inside bus
//! dispatch and logged, never surfaced to the dispatcher or other listeners.

use thiserror::Error;

/// Errors surfaced by coordinator status operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    /// An identifier failed validation before any backend call was made.
    #[error("invalid {field}: identifier must be a non-empty string")]
    InvalidArgument { field: &'static str },

    /// The backing store or transport could not be reached, or a write could
    /// not be confirmed. Never retried at this layer.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
}

impl CoordinatorError {
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        CoordinatorError::BackendUnavailable {
            reason: reason.into(),
        }
    }
}
