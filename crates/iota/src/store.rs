//! Storage seam between reconciliation logic and the IoT Agent.
//!
//! [`RemoteStore`] is the minimal set of primitives reconciliation needs for
//! one record kind. [`IotaClient`](crate::IotaClient) implements it over HTTP
//! for both config groups and devices. Tests implement it in memory.

use std::fmt;

use async_trait::async_trait;

use crate::{
    error::IotaError,
    models::{ConfigGroup, Device, GroupKey, Scope},
};

/// A record kind stored by the IoT Agent.
pub trait Resource: Clone + fmt::Debug + Send + Sync + 'static {
    type Key: Clone + fmt::Debug + fmt::Display + Send + Sync;

    /// Human-readable kind used in logs and errors.
    const KIND: &'static str;

    fn key(&self) -> Self::Key;
}

impl Resource for ConfigGroup {
    type Key = GroupKey;
    const KIND: &'static str = "config group";

    fn key(&self) -> GroupKey {
        self.group_key()
    }
}

impl Resource for Device {
    type Key = String;
    const KIND: &'static str = "device";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[async_trait]
pub trait RemoteStore<R: Resource>: Send + Sync {
    async fn exists(&self, scope: &Scope, key: &R::Key) -> Result<bool, IotaError>;

    async fn create(&self, scope: &Scope, record: &R) -> Result<(), IotaError>;

    /// Replaces the mutable fields of the record identified by `key`.
    async fn update(&self, scope: &Scope, key: &R::Key, record: &R) -> Result<(), IotaError>;

    /// # Errors
    ///
    /// Returns [`IotaError::NotFound`] when no record matches `key`.
    async fn read(&self, scope: &Scope, key: &R::Key) -> Result<R, IotaError>;

    async fn delete(&self, scope: &Scope, key: &R::Key) -> Result<(), IotaError>;
}
