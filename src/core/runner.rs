//! One collect, encode, publish cycle per scheduler tick.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, trace};

use super::{encoder::encode, publisher::Publisher, sources::AttributeSource};
use crate::error::Error;

/// Work triggered by the scheduler.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self) -> Result<(), Error>;
}

pub struct JobRunner {
    source: Arc<dyn AttributeSource>,
    publisher: Arc<Publisher>,
    api_key: String,
    default_device_id: Option<String>,
}

impl JobRunner {
    pub fn new(
        source: Arc<dyn AttributeSource>,
        publisher: Arc<Publisher>,
        api_key: impl Into<String>,
        default_device_id: Option<String>,
    ) -> Self {
        Self {
            source,
            publisher,
            api_key: api_key.into(),
            default_device_id,
        }
    }

    /// Publishes one collection to the default device.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when no default device id is set, otherwise
    /// whatever collection or publishing returned first.
    pub async fn publish(&self) -> Result<(), Error> {
        let device_id = self.default_device_id.as_deref().unwrap_or_default();
        self.publish_with_device_id(device_id).await
    }

    #[instrument(skip(self))]
    pub async fn publish_with_device_id(&self, device_id: &str) -> Result<(), Error> {
        if device_id.is_empty() {
            return Err(Error::Configuration("Device id cannot be empty".into()));
        }

        let attributes = self.source.collect().await?;
        trace!("Collected {} attributes", attributes.len());

        let payload = encode(&attributes);
        debug!("Payload: {}", payload);

        self.publisher
            .publish(&self.api_key, device_id, &payload)
            .await
    }
}

#[async_trait]
impl Job for JobRunner {
    async fn run(&self) -> Result<(), Error> {
        self.publish().await
    }
}
