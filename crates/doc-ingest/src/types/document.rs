//! Persisted document types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lifecycle status of a persisted document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Created, never ingested or reset by a retry
    Pending,
    /// Ingestion dispatched and not yet reconciled
    Processing,
    /// Worker reported success
    Completed,
    /// Worker reported failure
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(Error::database(format!("Unknown document status: {}", other))),
        }
    }
}

/// A document as persisted by the owning service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub file_name: String,
    /// MIME type of the uploaded file
    pub file_type: String,
    pub file_size: u64,
    /// Where the upload layer stored the file
    #[serde(default)]
    pub file_path: Option<String>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for a newly uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl NewDocument {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        if self.file_name.trim().is_empty() {
            return Err(Error::Validation("file is required".to_string()));
        }
        Ok(())
    }
}

/// Caller-editable fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocument {
    #[serde(default)]
    pub title: Option<String>,
}

/// Field changes applied by the store; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub status: Option<DocumentStatus>,
    pub status_message: Option<String>,
    pub retry_count: Option<u32>,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl From<UpdateDocument> for DocumentChanges {
    fn from(update: UpdateDocument) -> Self {
        Self {
            title: update.title,
            ..Default::default()
        }
    }
}

/// Document payload carried by a `start_ingestion` command.
///
/// The worker only needs the id; the remaining fields travel along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSnapshot {
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DocumentSnapshot {
    /// Snapshot carrying nothing but the id
    pub fn bare(id: i64) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        match serde_json::to_value(document)? {
            Value::Object(mut fields) => {
                fields.remove("id");
                Ok(Self {
                    id: document.id,
                    fields,
                })
            }
            other => Err(Error::internal(format!(
                "Document serialized to non-object: {}",
                other
            ))),
        }
    }

    /// Title, if the snapshot carries one
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let now = Utc::now();
        Document {
            id: 7,
            title: "Quarterly report".to_string(),
            file_name: "report.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            file_size: 2048,
            file_path: Some("uploads/report.pdf".to_string()),
            status: DocumentStatus::Pending,
            status_message: None,
            retry_count: 0,
            last_processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!("FAILED".parse::<DocumentStatus>().unwrap(), DocumentStatus::Failed);
        assert!("failed".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_document_json_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["fileName"], "report.pdf");
        assert_eq!(json["retryCount"], 0);
        assert_eq!(json["status"], "PENDING");
    }

    #[test]
    fn test_snapshot_keeps_fields() {
        let snapshot = DocumentSnapshot::from_document(&sample()).unwrap();
        assert_eq!(snapshot.id, 7);
        assert_eq!(snapshot.title(), Some("Quarterly report"));
        assert!(!snapshot.fields.contains_key("id"));

        let wire = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(wire["id"], 7);
        assert_eq!(wire["fileName"], "report.pdf");
    }

    #[test]
    fn test_snapshot_accepts_bare_id() {
        let snapshot: DocumentSnapshot = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert_eq!(snapshot, DocumentSnapshot::bare(12));
        assert_eq!(snapshot.title(), None);
    }

    #[test]
    fn test_new_document_validation() {
        let doc = NewDocument {
            title: "  ".to_string(),
            file_name: "a.txt".to_string(),
            file_type: "text/plain".to_string(),
            file_size: 1,
            file_path: None,
        };
        assert!(matches!(doc.validate(), Err(Error::Validation(_))));
    }
}
