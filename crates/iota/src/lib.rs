//! # ulcrawler-iota: FIWARE IoT Agent provisioning
//!
//! Typed access to the IoT Agent northbound API for config groups and
//! devices. [`IotaClient`] speaks HTTP; [`RemoteStore`] is the seam the
//! reconciliation layer is written against, so it can run over any store.

pub mod client;
pub mod error;
pub mod models;
pub mod store;

pub use client::IotaClient;
pub use error::IotaError;
pub use models::{Attribute, Command, ConfigGroup, Device, GroupKey, Scope, StaticAttribute};
pub use store::{RemoteStore, Resource};

/// HTTP status carried by [`IotaError::Status`].
pub use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, IotaError>;
