//! Error type for MQTT session operations.
//!
//! `TransferError` separates failures by the stage they occur in. Setup and
//! configuration problems surface before any network traffic. Connection
//! errors cover TCP, the CONNECT handshake and the broker refusing the
//! client. Transfer and delivery errors cover a publish that was queued but
//! never acknowledged.

use std::time::Duration;

use rumqttc::ConnectReturnCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// QoS value outside 0, 1 or 2.
    #[error("Invalid QoS value {0}, must be 0, 1, or 2")]
    InvalidQos(u8),

    /// Publish topic is empty or malformed.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Client setup error: {0}")]
    ClientSetup(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] validator::ValidationErrors),

    /// The local client could not queue a request.
    #[error("Client transfer error: {0}")]
    ClientTransfer(#[from] rumqttc::ClientError),

    /// Network-level failure reported by the event loop.
    ///
    /// Boxed because `ConnectionError` is large.
    #[error("Client connection error: {0}")]
    ClientConnection(#[from] Box<rumqttc::ConnectionError>),

    /// The broker answered CONNECT with a non-success return code.
    #[error("Connection refused by broker: {0:?}")]
    Refused(ConnectReturnCode),

    #[error("Timed out after {after:?} waiting for {stage}")]
    Timeout { stage: &'static str, after: Duration },

    /// The broker closed the session before the expected packet arrived.
    #[error("Connection closed while waiting for {0}")]
    Closed(&'static str),
}

impl From<rumqttc::ConnectionError> for TransferError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        match err {
            rumqttc::ConnectionError::ConnectionRefused(code) => TransferError::Refused(code),
            other => TransferError::ClientConnection(Box::new(other)),
        }
    }
}

impl TransferError {
    /// True for errors raised before or during the CONNECT handshake.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            TransferError::ClientConnection(_)
                | TransferError::Refused(_)
                | TransferError::Timeout { stage: "CONNACK", .. }
        )
    }
}

/// Extracts the innermost error message from an error chain.
pub(crate) fn root_cause(e: &dyn std::error::Error) -> String {
    let mut current = e;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string().trim_matches('"').to_string()
}
