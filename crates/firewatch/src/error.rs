//! Error types for firewatch.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for bot operations.
pub type BotResult<T> = Result<T, BotError>;

/// Errors that can occur in the bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Discord API rejected a request.
    #[error("discord API returned {status}: {body}")]
    Discord {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },

    /// The alert feed returned an unusable response.
    #[error("feed error: {0}")]
    Feed(String),

    /// An interaction request failed signature verification.
    #[error("invalid request signature")]
    Signature,

    /// An interaction request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A notifier could not deliver an alert.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// A long-running background task ended.
    #[error("background task stopped: {0}")]
    TaskStopped(String),

    /// Failed to bind the interactions listener.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),
}

impl BotError {
    /// Returns true if this error should stop the process at startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::BindFailed(_, _))
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<fire_alerts::AlertError> for BotError {
    fn from(err: fire_alerts::AlertError) -> Self {
        match err {
            fire_alerts::AlertError::InvalidConfig { reason } => Self::Config(reason),
            fire_alerts::AlertError::DeliveryFailed { reason } => Self::Delivery(reason),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::Signature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
            Self::InvalidRequest(_) | Self::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
