//! # ulcrawler-mqtt: one-shot MQTT publishing
//!
//! Small wrapper over `rumqttc` for clients that publish rarely and do not
//! want to keep a broker connection alive between publishes. Each
//! [`Session`] connects, publishes, waits for the acknowledgement that
//! matches the requested QoS and disconnects.
//!
//! ```ignore
//! use ulcrawler_mqtt::{Config, Session};
//!
//! let config = Config { client_id: "crawler".into(), ..Default::default() };
//! let mut session = Session::open(&config).await?;
//! session.publish("/ul/key/dev/attrs", config.qos_level()?, false, "t|21.5").await?;
//! session.close().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;

// Re-exports: Configuration
pub use config::{qos_from_u8, Config, Credentials};
// Re-exports: Client construction
pub use client::ClientBuilder;
// Re-exports: Error handling
pub use error::TransferError;
// Re-exports: Sessions
pub use session::Session;

/// Protocol QoS level, re-exported so callers need not depend on `rumqttc`.
pub use rumqttc::QoS;

/// Result type for MQTT operations.
pub type Result<T> = std::result::Result<T, TransferError>;
