//! MQTT client builder.
//!
//! `ClientBuilder` turns a [`Config`] into rumqttc's `AsyncClient` and
//! `EventLoop` pair. The pair is owned by a single [`Session`](crate::Session)
//! and dropped when the session closes.
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?.build()?;
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use validator::Validate;

use crate::{config::Config, error::TransferError};

/// Builder for constructing MQTT clients with fluent API.
///
/// The builder is consumed by `build()`, which returns both the client
/// and its associated event loop.
pub struct ClientBuilder {
    opts: MqttOptions,

    /// Capacity of the request channel between client and event loop.
    cap: usize,
}

impl ClientBuilder {
    /// Creates a new builder with minimal configuration.
    ///
    /// # Arguments
    /// - `client_id`: Identifier presented to the broker
    /// - `host`: Broker hostname or IP
    /// - `port`: Broker port
    /// - `cap`: Channel capacity for pending requests
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16, cap: usize) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
        }
    }

    /// Creates a builder from a validated [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ConfigError`] if the configuration fails validation.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let cap = config.request_channel_capacity.unwrap_or(10) as usize;
        let mut builder = Self::new(config.client_id.clone(), config.host.clone(), config.port, cap)
            .keep_alive(config.keep_alive)
            .clean_session(config.clean_session);

        if let Some(max_packet_size) = config.max_packet_size {
            builder = builder.max_packet_size(max_packet_size as usize, max_packet_size as usize);
        }

        if let Some(credentials) = config.credentials() {
            builder = builder.credentials(credentials.username, credentials.password);
        }

        Ok(builder)
    }

    /// Sets the keep-alive interval (in seconds).
    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    /// Sets the maximum packet size for incoming and outgoing messages.
    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    /// Sets MQTT authentication credentials sent in the CONNECT packet.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    pub fn client_id(&self) -> String {
        self.opts.client_id()
    }

    /// Constructs the MQTT client and event loop.
    ///
    /// No network traffic happens until the event loop is polled.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientSetup`] when the channel capacity is zero.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        if self.cap == 0 {
            return Err(TransferError::ClientSetup(
                "Request channel capacity must be at least 1".into(),
            ));
        }

        Ok(AsyncClient::new(self.opts, self.cap))
    }
}
