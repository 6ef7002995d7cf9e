//! Command channel between the lifecycle coordinator and the ingestion worker

pub mod client;
pub mod listener;
pub mod protocol;

pub use client::IngestionClient;
pub use listener::{ListenerHandle, WorkerListener};
pub use protocol::{Command, RequestFrame, ResponseFrame};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::processing::IngestionWorker;
use crate::types::{Document, DocumentSnapshot, JobAck, StatusRecord};

/// Trait for sending commands to an ingestion worker
///
/// Implementations:
/// - `IngestionClient`: remote worker over TCP
/// - `LocalChannel`: worker in the same process
#[async_trait]
pub trait IngestionChannel: Send + Sync {
    /// Hand a document to the worker. Returns once the worker has accepted it.
    async fn start_ingestion(&self, document: &Document) -> Result<JobAck>;

    /// Ask the worker for the last known status of a document
    async fn get_status(&self, document_id: i64) -> Result<StatusRecord>;

    /// Get channel name for logging
    fn name(&self) -> &str;
}

/// In-process channel wrapping a worker directly
pub struct LocalChannel {
    worker: Arc<IngestionWorker>,
}

impl LocalChannel {
    pub fn new(worker: Arc<IngestionWorker>) -> Self {
        Self { worker }
    }

    /// Get underlying worker for direct access
    pub fn inner(&self) -> &Arc<IngestionWorker> {
        &self.worker
    }
}

#[async_trait]
impl IngestionChannel for LocalChannel {
    async fn start_ingestion(&self, document: &Document) -> Result<JobAck> {
        let snapshot = DocumentSnapshot::from_document(document)?;
        Ok(self.worker.start_ingestion(&snapshot))
    }

    async fn get_status(&self, document_id: i64) -> Result<StatusRecord> {
        Ok(self.worker.get_status(document_id))
    }

    fn name(&self) -> &str {
        "local"
    }
}
