//! Context builder for flexible configuration
//!
//! This module provides a builder pattern for starting a [`GeoContext`] with
//! custom collaborators and settings.

use crate::config::Config;
use crate::context::GeoContext;
use crate::error::Result;
use crate::storage::{DocumentStore, JsonFileMetadataStore, MemoryDocumentStore, MemoryMetadataStore, MetadataStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for a [`GeoContext`].
///
/// Collaborators left unset default to empty in-memory stores.
pub struct GeoContextBuilder {
    config: Config,
    metadata: Option<Arc<dyn MetadataStore>>,
    documents: Option<Arc<dyn DocumentStore>>,
}

impl GeoContextBuilder {
    /// Create a new builder with default in-memory configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            metadata: None,
            documents: None,
        }
    }

    /// Set the index configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn srid(mut self, srid: i32) -> Self {
        self.config = self.config.with_srid(srid);
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Persist the indexed attribute set as JSON at `path`.
    pub fn metadata_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.metadata = Some(Arc::new(JsonFileMetadataStore::new(path.into())));
        self
    }

    pub fn documents(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Start the context.
    pub fn build(self) -> Result<GeoContext> {
        let metadata: Arc<dyn MetadataStore> = match self.metadata {
            Some(metadata) => metadata,
            None => Arc::new(MemoryMetadataStore::new()),
        };
        let documents: Arc<dyn DocumentStore> = match self.documents {
            Some(documents) => documents,
            None => Arc::new(MemoryDocumentStore::new()),
        };
        GeoContext::start(self.config, metadata, documents)
    }
}

impl Default for GeoContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GeoContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoContextBuilder")
            .field("config", &self.config)
            .field("metadata", &self.metadata.is_some())
            .field("documents", &self.documents.is_some())
            .finish()
    }
}
