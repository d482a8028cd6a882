//! Delivery of encoded payloads to the broker.
//!
//! Every call to [`Publisher::publish`] is a full connect, publish, close
//! cycle. Nothing is cached between calls, so a broker restart between two
//! ticks is invisible to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use ulcrawler_mqtt::{qos_from_u8, QoS, Session, TransferError};

use super::encoder::EncodedPayload;
use crate::{config::TransportConfig, error::Error};

/// Ultralight measure topic for a device.
pub fn topic(api_key: &str, device_id: &str) -> String {
    format!("/ul/{api_key}/{device_id}/attrs")
}

/// Opens broker connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, broker: &TransportConfig)
        -> Result<Box<dyn Connection>, TransferError>;
}

/// An open broker connection, used for exactly one publish.
#[async_trait]
pub trait Connection: Send {
    async fn publish(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransferError>;

    async fn close(self: Box<Self>);
}

#[async_trait]
impl Connection for Session {
    async fn publish(
        &mut self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<(), TransferError> {
        Session::publish(self, topic, qos, retain, payload.to_vec()).await
    }

    async fn close(self: Box<Self>) {
        Session::close(*self).await
    }
}

/// Connects with [`Session::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

#[async_trait]
impl Connector for MqttConnector {
    async fn connect(
        &self,
        broker: &TransportConfig,
    ) -> Result<Box<dyn Connection>, TransferError> {
        let session = Session::open(broker).await?;
        Ok(Box::new(session))
    }
}

pub struct Publisher {
    connector: Arc<dyn Connector>,
    broker: Arc<TransportConfig>,
}

impl Publisher {
    pub fn new(broker: TransportConfig) -> Self {
        Self::with_connector(broker, Arc::new(MqttConnector))
    }

    pub fn with_connector(broker: TransportConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            broker: Arc::new(broker),
        }
    }

    pub fn broker(&self) -> &TransportConfig {
        &self.broker
    }

    /// Publishes `payload` as the measures of `device_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] for an empty device id or api key, or an
    ///   unusable broker setting. No network traffic happens.
    /// - [`Error::Connection`] if the broker cannot be reached or refuses.
    /// - [`Error::Publish`] if delivery is not acknowledged in time.
    #[instrument(skip(self, payload), fields(broker = %self.broker.address()))]
    pub async fn publish(
        &self,
        api_key: &str,
        device_id: &str,
        payload: &EncodedPayload,
    ) -> Result<(), Error> {
        if device_id.is_empty() {
            return Err(Error::Configuration("Device id cannot be empty".into()));
        }
        if api_key.is_empty() {
            return Err(Error::Configuration("API key cannot be empty".into()));
        }
        let qos = qos_from_u8(self.broker.qos).map_err(|e| Error::Configuration(e.to_string()))?;

        let topic = topic(api_key, device_id);
        let mut connection = self
            .connector
            .connect(&self.broker)
            .await
            .map_err(|e| match e {
                TransferError::ConfigError(_) | TransferError::ClientSetup(_) => {
                    Error::Configuration(e.to_string())
                }
                other => Error::Connection(other),
            })?;

        let result = connection
            .publish(&topic, qos, self.broker.retain, payload.as_bytes())
            .await;
        connection.close().await;

        match result {
            Ok(()) => {
                debug!("Published {} bytes to {}", payload.len(), topic);
                Ok(())
            }
            Err(e) => {
                warn!("Publish to {} failed: {}", topic, e);
                Err(Error::Publish(e))
            }
        }
    }
}
