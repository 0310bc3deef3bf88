//! Error types for Heartzone

use thiserror::Error;

/// Errors that can occur while monitoring heart rate
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Heart rate data is not available on this device")]
    DeviceUnavailable,

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Failed to fetch heart rate: {0}")]
    FetchFailed(String),

    #[error("Failed to subscribe to heart rate updates: {0}")]
    SubscriptionFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to parse sample: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
