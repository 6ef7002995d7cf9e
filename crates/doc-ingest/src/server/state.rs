//! Application state for the HTTP server

use std::sync::Arc;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::lifecycle::DocumentCoordinator;
use crate::storage::{DocumentDb, DocumentStore};
use crate::transport::{IngestionChannel, IngestionClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: IngestConfig,
    /// Lifecycle coordinator over the document store and worker channel
    coordinator: DocumentCoordinator,
}

impl AppState {
    /// Open the document database and the worker client from configuration
    pub fn new(config: IngestConfig) -> Result<Self> {
        tracing::info!("Initializing document ingestion state...");

        let store: Arc<dyn DocumentStore> = Arc::new(DocumentDb::new(&config.database.path)?);
        tracing::info!("Document database opened at {}", config.database.path.display());

        let client = IngestionClient::new(&config.client);
        tracing::info!("Ingestion worker expected at {}", client.address());
        let channel: Arc<dyn IngestionChannel> = Arc::new(client);

        Ok(Self::with_parts(config, store, channel))
    }

    /// Build state around an existing store and channel
    pub fn with_parts(
        config: IngestConfig,
        store: Arc<dyn DocumentStore>,
        channel: Arc<dyn IngestionChannel>,
    ) -> Self {
        let coordinator = DocumentCoordinator::new(store, channel, config.lifecycle.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                coordinator,
            }),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    pub fn coordinator(&self) -> &DocumentCoordinator {
        &self.inner.coordinator
    }
}
