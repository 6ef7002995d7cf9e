//! Worker-reported ingestion status types

use serde::{Deserialize, Serialize};

use super::DocumentStatus;

pub const PROCESSING_COMPLETE_MESSAGE: &str = "Processing complete";
pub const PROCESSING_FAILED_MESSAGE: &str = "Mock processing failure";
pub const NOT_IN_QUEUE_MESSAGE: &str = "Document not in processing queue";
pub const INGESTION_STARTED_MESSAGE: &str = "Ingestion started";

/// Ingestion status as reported by the worker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IngestionStatus {
    #[serde(rename = "PROCESSING", alias = "processing")]
    Processing,
    #[serde(rename = "COMPLETED", alias = "completed")]
    Completed,
    #[serde(rename = "FAILED", alias = "failed")]
    Failed,
    /// No record is known for the id. A valid answer, not an error.
    #[serde(rename = "not_found", alias = "NOT_FOUND")]
    NotFound,
}

impl IngestionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Persisted status this outcome reconciles to, for terminal outcomes only
    pub fn reconciled(&self) -> Option<DocumentStatus> {
        match self {
            Self::Completed => Some(DocumentStatus::Completed),
            Self::Failed => Some(DocumentStatus::Failed),
            Self::Processing | Self::NotFound => None,
        }
    }
}

/// Last known ingestion outcome for a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: IngestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
}

impl StatusRecord {
    pub fn processing(document_id: i64) -> Self {
        Self {
            status: IngestionStatus::Processing,
            progress: Some(0),
            message: None,
            document_id: Some(document_id),
        }
    }

    pub fn completed(document_id: i64) -> Self {
        Self {
            status: IngestionStatus::Completed,
            progress: Some(100),
            message: Some(PROCESSING_COMPLETE_MESSAGE.to_string()),
            document_id: Some(document_id),
        }
    }

    pub fn failed(document_id: i64) -> Self {
        Self {
            status: IngestionStatus::Failed,
            progress: None,
            message: Some(PROCESSING_FAILED_MESSAGE.to_string()),
            document_id: Some(document_id),
        }
    }

    /// Synthetic answer for an id with no record
    pub fn not_found() -> Self {
        Self {
            status: IngestionStatus::NotFound,
            progress: None,
            message: Some(NOT_IN_QUEUE_MESSAGE.to_string()),
            document_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Immediate acknowledgement of a `start_ingestion` command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobAck {
    pub document_id: i64,
    pub status: IngestionStatus,
    pub message: String,
}

impl JobAck {
    pub fn accepted(document_id: i64) -> Self {
        Self {
            document_id,
            status: IngestionStatus::Processing,
            message: INGESTION_STARTED_MESSAGE.to_string(),
        }
    }
}
