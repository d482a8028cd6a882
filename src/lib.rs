//! ulcrawler: periodic attribute crawler for FIWARE IoT Agents
//!
//! On startup the crawler makes sure its config group and device exist on
//! the IoT Agent, then on every cron tick collects a set of attributes,
//! encodes them as an Ultralight 2.0 measure and publishes them over MQTT to
//! `/ul/{apiKey}/{deviceId}/attrs`.
//!
//! ## Modules
//!
//! * `config`: Configuration structures, loading, validation, and defaults.
//!   TOML file plus environment overrides, validated with `validator`.
//!
//! * `core`: Runtime components:
//!   - Reconciler for config groups and devices
//!   - Ultralight encoder
//!   - One-shot MQTT publisher
//!   - Job runner and cron scheduler
//!   - Attribute sources
//!
//! * `logger`: Centralized logging initialization using `tracing`.
//!   Supports console output in multiple formats (compact, pretty, JSON)
//!   and optional systemd journald integration.
//!
//! * `error`: The crate-wide [`Error`] type.

pub mod config;
pub mod core;
pub mod error;
pub mod logger;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
