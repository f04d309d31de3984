//! Error types for MindEase

use thiserror::Error;

/// Errors that can occur while scoring, storing or alerting
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid biometric sample: {0}")]
    InvalidSample(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Failed to record alert: {0}")]
    AlertPersistence(String),

    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),

    #[error("Profile not found for user {0}")]
    ProfileNotFound(String),

    #[error("Monitor is not running")]
    MonitorStopped,
}
