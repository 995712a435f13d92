//! Error types for the fire-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alert relay core.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid tracker or poller configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Delivering an alert to the destination failed.
    #[error("delivery failed: {reason}")]
    DeliveryFailed {
        /// The reason the delivery failed.
        reason: String,
    },
}

impl AlertError {
    /// Creates a delivery failure from anything displayable.
    pub fn delivery(reason: impl std::fmt::Display) -> Self {
        Self::DeliveryFailed {
            reason: reason.to_string(),
        }
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
