//! Error types for sensor, transport and clock failures

use thiserror::Error;

/// A sensor could not produce a reading
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("{sensor} read failed: {reason}")]
    ReadFailed { sensor: &'static str, reason: String },

    #[error("{sensor} rejected baseline: {reason}")]
    BaselineRejected { sensor: &'static str, reason: String },
}

/// Failure of a connect/subscribe/publish/loop/disconnect call
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Connection refused by broker: {0}")]
    Refused(String),

    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Network time could not be obtained
#[derive(Error, Debug)]
pub enum TimeSyncError {
    #[error("SNTP I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SNTP request to {0} timed out")]
    Timeout(String),

    #[error("Invalid SNTP response: {0}")]
    InvalidResponse(&'static str),

    #[error("Time sync failed after {attempts} attempts")]
    Exhausted { attempts: u32 },
}
