//! Persisted document lifecycle around the ingestion worker
//!
//! The coordinator owns every write to persisted documents. Worker outcomes
//! reach storage only when a client polls `get_ingestion_status`; until then
//! the persisted status may lag behind what the worker knows.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::error::{Error, Result};
use crate::storage::DocumentStore;
use crate::transport::IngestionChannel;
use crate::types::{
    Document, DocumentChanges, DocumentStatus, JobAck, NewDocument, StatusRecord, UpdateDocument,
};

pub const INGESTION_INITIATED_MESSAGE: &str = "Ingestion initiated";
pub const RETRYING_MESSAGE: &str = "Retrying ingestion";
pub const ALREADY_PROCESSING_MESSAGE: &str = "Document is already being processed";
pub const UPDATE_WHILE_PROCESSING_MESSAGE: &str =
    "Cannot update document while it is being processed";
pub const DELETE_WHILE_PROCESSING_MESSAGE: &str =
    "Cannot delete document while it is being processed";

/// Result of a trigger: the caller-facing message plus the worker's acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub message: &'static str,
    pub ack: JobAck,
}

/// Document lifecycle coordinator
pub struct DocumentCoordinator {
    store: Arc<dyn DocumentStore>,
    channel: Arc<dyn IngestionChannel>,
    config: LifecycleConfig,
}

impl DocumentCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        channel: Arc<dyn IngestionChannel>,
        config: LifecycleConfig,
    ) -> Self {
        tracing::info!(
            "Document coordinator using {} store and {} ingestion channel",
            store.name(),
            channel.name()
        );
        Self {
            store,
            channel,
            config,
        }
    }

    pub fn create_document(&self, document: NewDocument) -> Result<Document> {
        document.validate()?;
        let created = self.store.create(&document)?;
        tracing::info!("Created document {} ({})", created.id, created.title);
        Ok(created)
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        self.store.find_all()
    }

    pub fn get_document(&self, id: i64) -> Result<Document> {
        self.store.find_one(id)
    }

    /// Update caller-editable fields. Rejected while the document is processing.
    pub fn update_document(&self, id: i64, update: UpdateDocument) -> Result<Document> {
        let document = self.store.find_one(id)?;
        if document.status == DocumentStatus::Processing {
            return Err(Error::conflict(UPDATE_WHILE_PROCESSING_MESSAGE));
        }

        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("title must not be empty".to_string()));
            }
        }

        self.store.update(id, &DocumentChanges::from(update))
    }

    /// Delete a document and its stored file. Rejected while processing.
    pub fn remove_document(&self, id: i64) -> Result<()> {
        let document = self.store.find_one(id)?;
        if document.status == DocumentStatus::Processing {
            return Err(Error::conflict(DELETE_WHILE_PROCESSING_MESSAGE));
        }

        if let Some(path) = document.file_path.as_deref() {
            remove_stored_file(Path::new(path))?;
        }

        self.store.delete(id)?;
        tracing::info!("Deleted document {}", id);
        Ok(())
    }

    /// Hand a document to the worker.
    ///
    /// Returns once the worker has acknowledged the job, never waiting for the
    /// job itself. With write-through enabled, PROCESSING is persisted only
    /// after the acknowledgement, so a failed dispatch leaves the document as it was.
    pub async fn trigger_ingestion(&self, id: i64) -> Result<Dispatch> {
        let document = self.store.find_one(id)?;

        let ack = match self.channel.start_ingestion(&document).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!("Failed to dispatch document {}: {}", id, e);
                return Err(e);
            }
        };
        tracing::info!("Worker accepted document {}: {}", ack.document_id, ack.message);

        if self.config.write_through_on_trigger {
            self.store.update(
                id,
                &DocumentChanges {
                    status: Some(DocumentStatus::Processing),
                    last_processed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )?;
        }

        Ok(Dispatch {
            message: INGESTION_INITIATED_MESSAGE,
            ack,
        })
    }

    /// Re-dispatch a document. Failed documents have their retry state reset first.
    pub async fn retry_ingestion(&self, id: i64) -> Result<Dispatch> {
        let document = self.store.find_one(id)?;

        match document.status {
            DocumentStatus::Processing => return Err(Error::conflict(ALREADY_PROCESSING_MESSAGE)),
            DocumentStatus::Failed => {
                self.store.update(
                    id,
                    &DocumentChanges {
                        status: Some(DocumentStatus::Pending),
                        status_message: Some(RETRYING_MESSAGE.to_string()),
                        retry_count: Some(0),
                        ..Default::default()
                    },
                )?;
                tracing::info!("Reset failed document {} for retry", id);
            }
            DocumentStatus::Pending | DocumentStatus::Completed => {}
        }

        self.trigger_ingestion(id).await
    }

    /// Ask the worker for a document's status, persisting terminal outcomes
    pub async fn get_ingestion_status(&self, id: i64) -> Result<StatusRecord> {
        let record = self.channel.get_status(id).await?;

        if let Some(status) = record.status.reconciled() {
            let changes = DocumentChanges {
                status: Some(status),
                status_message: record.message.clone(),
                ..Default::default()
            };

            match self.store.update(id, &changes) {
                Ok(_) => tracing::debug!("Reconciled document {} to {}", id, status),
                Err(Error::NotFound(_)) => {
                    tracing::warn!("Worker reported {} for unknown document {}", status, id)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(record)
    }
}

fn remove_stored_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed stored file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::processing::IngestionWorker;
    use crate::storage::DocumentDb;
    use crate::transport::LocalChannel;
    use crate::types::IngestionStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Records dispatched ids and answers status polls from a script
    #[derive(Default)]
    struct ScriptedChannel {
        started: Mutex<Vec<i64>>,
        status: Mutex<Option<StatusRecord>>,
    }

    #[async_trait]
    impl IngestionChannel for ScriptedChannel {
        async fn start_ingestion(&self, document: &Document) -> Result<JobAck> {
            self.started.lock().push(document.id);
            Ok(JobAck::accepted(document.id))
        }

        async fn get_status(&self, _document_id: i64) -> Result<StatusRecord> {
            Ok(self.status.lock().clone().unwrap_or_else(StatusRecord::not_found))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct DownChannel;

    #[async_trait]
    impl IngestionChannel for DownChannel {
        async fn start_ingestion(&self, _document: &Document) -> Result<JobAck> {
            Err(Error::transport("connection refused"))
        }

        async fn get_status(&self, _document_id: i64) -> Result<StatusRecord> {
            Err(Error::transport("connection refused"))
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn upload(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            file_name: format!("{}.pdf", title),
            file_type: "application/pdf".to_string(),
            file_size: 512,
            file_path: None,
        }
    }

    fn setup(config: LifecycleConfig) -> (DocumentCoordinator, Arc<ScriptedChannel>) {
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let channel = Arc::new(ScriptedChannel::default());
        let coordinator = DocumentCoordinator::new(store, channel.clone(), config);
        (coordinator, channel)
    }

    fn set_status(coordinator: &DocumentCoordinator, id: i64, status: DocumentStatus) {
        coordinator
            .store
            .update(
                id,
                &DocumentChanges {
                    status: Some(status),
                    retry_count: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_dispatches_without_persisting() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();

        let dispatch = coordinator.trigger_ingestion(doc.id).await.unwrap();
        assert_eq!(dispatch.message, INGESTION_INITIATED_MESSAGE);
        assert_eq!(dispatch.ack, JobAck::accepted(doc.id));

        assert_eq!(*channel.started.lock(), vec![doc.id]);
        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert!(stored.last_processed_at.is_none());
    }

    #[tokio::test]
    async fn test_trigger_write_through() {
        let (coordinator, _) = setup(LifecycleConfig {
            write_through_on_trigger: true,
        });
        let doc = coordinator.create_document(upload("a")).unwrap();

        coordinator.trigger_ingestion(doc.id).await.unwrap();

        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Processing);
        assert!(stored.last_processed_at.is_some());
    }

    #[tokio::test]
    async fn test_trigger_unknown_document() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        assert!(matches!(coordinator.trigger_ingestion(42).await, Err(Error::NotFound(42))));
        assert!(channel.started.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_returned() {
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let coordinator =
            DocumentCoordinator::new(store, Arc::new(DownChannel), LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();

        let result = coordinator.trigger_ingestion(doc.id).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_failed_write_through_dispatch_leaves_document_retryable() {
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let coordinator = DocumentCoordinator::new(
            store,
            Arc::new(DownChannel),
            LifecycleConfig {
                write_through_on_trigger: true,
            },
        );
        let doc = coordinator.create_document(upload("a")).unwrap();

        assert!(matches!(
            coordinator.trigger_ingestion(doc.id).await,
            Err(Error::Transport(_))
        ));
        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert!(stored.last_processed_at.is_none());

        // Not stuck behind the PROCESSING gate.
        assert!(matches!(
            coordinator.retry_ingestion(doc.id).await,
            Err(Error::Transport(_))
        ));
        coordinator
            .update_document(
                doc.id,
                UpdateDocument {
                    title: Some("b".to_string()),
                },
            )
            .unwrap();
        coordinator.remove_document(doc.id).unwrap();
    }

    #[tokio::test]
    async fn test_retry_rejected_while_processing() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();
        set_status(&coordinator, doc.id, DocumentStatus::Processing);

        let result = coordinator.retry_ingestion(doc.id).await;
        assert!(matches!(result, Err(Error::Conflict(msg)) if msg == ALREADY_PROCESSING_MESSAGE));
        assert!(channel.started.lock().is_empty());
    }

    #[tokio::test]
    async fn test_retry_resets_failed_document() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();
        set_status(&coordinator, doc.id, DocumentStatus::Failed);

        coordinator.retry_ingestion(doc.id).await.unwrap();

        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.status_message.as_deref(), Some(RETRYING_MESSAGE));
        assert_eq!(*channel.started.lock(), vec![doc.id]);
    }

    #[tokio::test]
    async fn test_retry_completed_redispatches_without_reset() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();
        set_status(&coordinator, doc.id, DocumentStatus::Completed);

        coordinator.retry_ingestion(doc.id).await.unwrap();

        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Completed);
        assert_eq!(stored.retry_count, 2);
        assert_eq!(channel.started.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_status_poll_persists_terminal_outcome() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();

        *channel.status.lock() = Some(StatusRecord::failed(doc.id));
        let record = coordinator.get_ingestion_status(doc.id).await.unwrap();
        assert_eq!(record.status, IngestionStatus::Failed);

        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(stored.status_message.as_deref(), Some("Mock processing failure"));
    }

    #[tokio::test]
    async fn test_status_poll_does_not_persist_processing_or_not_found() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();

        let record = coordinator.get_ingestion_status(doc.id).await.unwrap();
        assert_eq!(record.status, IngestionStatus::NotFound);

        *channel.status.lock() = Some(StatusRecord::processing(doc.id));
        coordinator.get_ingestion_status(doc.id).await.unwrap();

        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert_eq!(stored.updated_at, doc.updated_at);
    }

    #[tokio::test]
    async fn test_status_poll_for_unknown_document() {
        let (coordinator, channel) = setup(LifecycleConfig::default());
        *channel.status.lock() = Some(StatusRecord::completed(77));

        let record = coordinator.get_ingestion_status(77).await.unwrap();
        assert_eq!(record, StatusRecord::completed(77));
    }

    #[tokio::test]
    async fn test_status_poll_transport_failure() {
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let coordinator =
            DocumentCoordinator::new(store, Arc::new(DownChannel), LifecycleConfig::default());
        assert!(matches!(
            coordinator.get_ingestion_status(1).await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_gated_while_processing() {
        let (coordinator, _) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();
        set_status(&coordinator, doc.id, DocumentStatus::Processing);

        let update = coordinator.update_document(
            doc.id,
            UpdateDocument {
                title: Some("b".to_string()),
            },
        );
        assert!(matches!(update, Err(Error::Conflict(msg)) if msg == UPDATE_WHILE_PROCESSING_MESSAGE));

        let delete = coordinator.remove_document(doc.id);
        assert!(matches!(delete, Err(Error::Conflict(msg)) if msg == DELETE_WHILE_PROCESSING_MESSAGE));
        assert!(coordinator.get_document(doc.id).is_ok());
    }

    #[tokio::test]
    async fn test_update_title() {
        let (coordinator, _) = setup(LifecycleConfig::default());
        let doc = coordinator.create_document(upload("a")).unwrap();

        let updated = coordinator
            .update_document(
                doc.id,
                UpdateDocument {
                    title: Some("renamed".to_string()),
                },
            )
            .unwrap();
        assert_eq!(updated.title, "renamed");

        let blank = coordinator.update_document(
            doc.id,
            UpdateDocument {
                title: Some("  ".to_string()),
            },
        );
        assert!(matches!(blank, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_remove_deletes_stored_file() {
        let (coordinator, _) = setup(LifecycleConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let mut new_doc = upload("a");
        new_doc.file_path = Some(path.to_string_lossy().into_owned());
        let doc = coordinator.create_document(new_doc).unwrap();

        coordinator.remove_document(doc.id).unwrap();
        assert!(!path.exists());
        assert!(matches!(coordinator.get_document(doc.id), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_file() {
        let (coordinator, _) = setup(LifecycleConfig::default());
        let mut new_doc = upload("a");
        new_doc.file_path = Some("/nonexistent/doc-ingest/upload.pdf".to_string());
        let doc = coordinator.create_document(new_doc).unwrap();

        coordinator.remove_document(doc.id).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_with_local_worker() {
        let worker_config = WorkerConfig {
            success_probability: 0.0,
            ..WorkerConfig::default()
        };
        let worker = Arc::new(IngestionWorker::with_seed(&worker_config, 5).unwrap());
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let coordinator = DocumentCoordinator::new(
            store,
            Arc::new(LocalChannel::new(worker)),
            LifecycleConfig::default(),
        );
        let doc = coordinator.create_document(upload("a")).unwrap();

        coordinator.trigger_ingestion(doc.id).await.unwrap();
        let record = coordinator.get_ingestion_status(doc.id).await.unwrap();
        assert_eq!(record.status, IngestionStatus::Processing);

        tokio::time::sleep(Duration::from_millis(10_001)).await;
        let record = coordinator.get_ingestion_status(doc.id).await.unwrap();
        assert_eq!(record.status, IngestionStatus::Failed);
        assert_eq!(
            coordinator.get_document(doc.id).unwrap().status,
            DocumentStatus::Failed
        );

        coordinator.retry_ingestion(doc.id).await.unwrap();
        assert_eq!(
            coordinator.get_ingestion_status(doc.id).await.unwrap(),
            StatusRecord::processing(doc.id)
        );
        let stored = coordinator.get_document(doc.id).unwrap();
        assert_eq!(stored.status, DocumentStatus::Pending);
        assert_eq!(stored.status_message.as_deref(), Some(RETRYING_MESSAGE));
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_right_after_trigger_sees_processing() {
        let worker = Arc::new(IngestionWorker::with_seed(&WorkerConfig::default(), 7).unwrap());
        let store = Arc::new(DocumentDb::in_memory().unwrap());
        let coordinator = DocumentCoordinator::new(
            store,
            Arc::new(LocalChannel::new(worker)),
            LifecycleConfig::default(),
        );
        let doc = coordinator.create_document(upload("a")).unwrap();

        coordinator.trigger_ingestion(doc.id).await.unwrap();
        let record = coordinator.get_ingestion_status(doc.id).await.unwrap();
        assert_eq!(record.status, IngestionStatus::Processing);
        assert_eq!(record.progress, Some(0));
        assert_eq!(record.document_id, Some(doc.id));
    }
}
