//! Broker connection settings for one-shot publish sessions.
//!
//! Every publish opens a fresh session with these settings, so there are no
//! reconnection or backoff knobs here. Timeouts bound the two waits a
//! session performs: the CONNACK after connecting and the delivery
//! acknowledgement after a publish.
//!
//! # Examples
//!
//! ```ignore
//! let config = Config {
//!     host: "mosquitto".into(),
//!     client_id: "crawler-01".into(),
//!     qos: 1,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use validator::Validate;

use rumqttc::QoS;

use crate::error::TransferError;

/// MQTT broker configuration.
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Client identifier presented in CONNECT. Required.
    #[validate(length(
        min = 1,
        max = 128,
        message = "Client ID must be between 1 and 128 characters"
    ))]
    pub client_id: String,

    /// Username sent with CONNECT. Credentials are only attached when this
    /// is present and non-empty.
    pub username: Option<String>,

    pub password: Option<String>,

    /// Seconds to wait for the TCP connection and CONNACK.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Seconds to wait for the delivery acknowledgement of a single publish.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Acknowledgement timeout must be between 1 and 300 seconds"
    ))]
    pub ack_timeout: u64,

    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Delivery guarantee for attribute publishes (0, 1 or 2).
    #[validate(range(max = 2, message = "QoS must be 0, 1 or 2"))]
    pub qos: u8,

    pub retain: bool,

    pub clean_session: bool,

    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u16>,

    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,
}

/// Username and password pair attached to CONNECT.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Config {
    /// Returns the credentials to send, if a username is configured.
    ///
    /// A missing password is sent as an empty string.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some(Credentials {
            username: username.to_string(),
            password: self.password.clone().unwrap_or_default(),
        })
    }

    /// Configured QoS as the protocol level.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidQos`] for values outside 0..=2.
    pub fn qos_level(&self) -> Result<QoS, TransferError> {
        qos_from_u8(self.qos)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Maps a numeric QoS onto the protocol level.
pub fn qos_from_u8(qos: u8) -> Result<QoS, TransferError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(TransferError::InvalidQos(other)),
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "mosquitto".to_string(),
            port: 1883,
            client_id: String::new(),
            username: None,
            password: None,
            connection_timeout: 30,
            ack_timeout: 10,
            keep_alive: 60,
            qos: 0,
            retain: false,
            clean_session: true,
            max_packet_size: Some(65_535),
            request_channel_capacity: Some(10),
        }
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connection_timeout", &self.connection_timeout)
            .field("ack_timeout", &self.ack_timeout)
            .field("keep_alive", &self.keep_alive)
            .field("qos", &self.qos)
            .field("retain", &self.retain)
            .field("clean_session", &self.clean_session)
            .field("max_packet_size", &self.max_packet_size)
            .field("request_channel_capacity", &self.request_channel_capacity)
            .finish()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            client_id: "crawler".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_requires_client_id() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_invalid_qos_rejected() {
        let config = Config { qos: 3, ..valid() };
        assert!(config.validate().is_err());
        assert!(matches!(config.qos_level(), Err(TransferError::InvalidQos(3))));
    }

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_u8(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_u8(2).unwrap(), QoS::ExactlyOnce);
    }

    #[test]
    fn test_credentials_require_username() {
        assert!(valid().credentials().is_none());

        let empty = Config {
            username: Some(String::new()),
            password: Some("secret".into()),
            ..valid()
        };
        assert!(empty.credentials().is_none());

        let user_only = Config {
            username: Some("user".into()),
            ..valid()
        };
        let creds = user_only.credentials().unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config {
            username: Some("user".into()),
            password: Some("hunter2".into()),
            ..valid()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_deserialize_partial_toml_shape() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "host": "broker.local",
            "client_id": "abc",
            "qos": 2
        }))
        .unwrap();
        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 1883);
        assert_eq!(config.qos, 2);
        assert_eq!(config.ack_timeout, 10);
    }
}
