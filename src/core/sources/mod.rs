//! Attribute sources polled once per tick.
//!
//! A source is anything that can asynchronously produce an
//! [`AttributeSet`]. The crawler owns exactly one source; combine several
//! with [`MergedSource`].

use std::sync::Arc;

use async_trait::async_trait;

use super::encoder::AttributeSet;

pub mod error;
pub mod host;

pub use error::SourceError;
pub use host::HostSource;

#[async_trait]
pub trait AttributeSource: Send + Sync + 'static {
    /// Collects the attributes for one tick.
    async fn collect(&self) -> Result<AttributeSet, SourceError>;
}

/// Returns the same attributes on every tick.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    attributes: AttributeSet,
}

impl StaticSource {
    pub fn new(attributes: AttributeSet) -> Self {
        Self { attributes }
    }
}

#[async_trait]
impl AttributeSource for StaticSource {
    async fn collect(&self) -> Result<AttributeSet, SourceError> {
        Ok(self.attributes.clone())
    }
}

/// Collects from every inner source in order and merges the results.
///
/// Later sources win on name collisions. The first failing source fails the
/// whole collection.
#[derive(Clone, Default)]
pub struct MergedSource {
    sources: Vec<Arc<dyn AttributeSource>>,
}

impl MergedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl AttributeSource) -> Self {
        self.sources.push(Arc::new(source));
        self
    }
}

#[async_trait]
impl AttributeSource for MergedSource {
    async fn collect(&self) -> Result<AttributeSet, SourceError> {
        let mut merged = AttributeSet::new();
        for source in &self.sources {
            merged.extend(source.collect().await?);
        }
        Ok(merged)
    }
}
