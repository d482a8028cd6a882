//! Crate-level error taxonomy.
//!
//! Every public operation returns [`Error`]. The variant says which stage
//! failed so callers can tell a misconfiguration from a broker outage or a
//! platform rejection.

use thiserror::Error;
use ulcrawler_iota::IotaError;
use ulcrawler_mqtt::TransferError;

use crate::core::sources::SourceError;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid setting detected before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The broker could not be reached or refused the client.
    #[error("Connection error: {0}")]
    Connection(#[source] TransferError),

    /// The publish was not acknowledged.
    #[error("Publish error: {0}")]
    Publish(#[source] TransferError),

    /// A provisioning call to the IoT Agent failed.
    #[error("Remote {operation} of {kind} failed: {source}")]
    RemoteService {
        kind: &'static str,
        operation: &'static str,
        #[source]
        source: IotaError,
    },

    /// The remote record is inconsistent with what reconciliation expects.
    #[error("Reconciliation of {kind} {key} failed: {reason}")]
    Reconciliation {
        kind: &'static str,
        key: String,
        reason: String,
    },

    /// An attribute source failed to produce a set.
    #[error("Collection error: {0}")]
    Collection(#[from] SourceError),
}

impl Error {
    pub(crate) fn remote(kind: &'static str, operation: &'static str, source: IotaError) -> Self {
        Error::RemoteService {
            kind,
            operation,
            source,
        }
    }
}
