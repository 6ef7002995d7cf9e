//! SQLite database for persisted documents

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::types::{Document, DocumentChanges, DocumentStatus, NewDocument};

const DOCUMENT_COLUMNS: &str = "id, title, file_name, file_type, file_size, file_path, status, \
     status_message, retry_count, last_processed_at, created_at, updated_at";

/// SQLite-backed document store
pub struct DocumentDb {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_path TEXT,
                status TEXT NOT NULL DEFAULT 'PENDING',
                status_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_processed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);
        "#)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

        tracing::debug!("Document database migrations complete");
        Ok(())
    }
}

impl DocumentStore for DocumentDb {
    fn create(&self, document: &NewDocument) -> Result<Document> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO documents (
                title, file_name, file_type, file_size, file_path, status,
                retry_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)
            "#,
            params![
                document.title,
                document.file_name,
                document.file_type,
                document.file_size as i64,
                document.file_path,
                DocumentStatus::Pending.as_str(),
                now,
            ],
        )
        .map_err(|e| Error::database(format!("Failed to insert document: {}", e)))?;

        let id = conn.last_insert_rowid();
        select_document(&conn, id)?.ok_or(Error::NotFound(id))
    }

    fn find_all(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents ORDER BY created_at DESC, id DESC",
                DOCUMENT_COLUMNS
            ))
            .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

        let documents = stmt
            .query_map([], row_to_document)
            .map_err(|e| Error::database(format!("Failed to list documents: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(format!("Failed to read document row: {}", e)))?;

        Ok(documents)
    }

    fn find_one(&self, id: i64) -> Result<Document> {
        let conn = self.conn.lock();
        select_document(&conn, id)?.ok_or(Error::NotFound(id))
    }

    fn update(&self, id: i64, changes: &DocumentChanges) -> Result<Document> {
        let conn = self.conn.lock();

        let updated = conn
            .execute(
                r#"
                UPDATE documents SET
                    title = COALESCE(?2, title),
                    status = COALESCE(?3, status),
                    status_message = COALESCE(?4, status_message),
                    retry_count = COALESCE(?5, retry_count),
                    last_processed_at = COALESCE(?6, last_processed_at),
                    updated_at = ?7
                WHERE id = ?1
                "#,
                params![
                    id,
                    changes.title,
                    changes.status.map(|s| s.as_str()),
                    changes.status_message,
                    changes.retry_count.map(i64::from),
                    changes.last_processed_at.map(|t| t.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| Error::database(format!("Failed to update document {}: {}", id, e)))?;

        if updated == 0 {
            return Err(Error::NotFound(id));
        }

        select_document(&conn, id)?.ok_or(Error::NotFound(id))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();

        let deleted = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(|e| Error::database(format!("Failed to delete document {}: {}", id, e)))?;

        if deleted == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn select_document(conn: &Connection, id: i64) -> Result<Option<Document>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS))
        .map_err(|e| Error::database(format!("Failed to prepare query: {}", e)))?;

    let document = stmt
        .query_row(params![id], row_to_document)
        .optional()
        .map_err(|e| Error::database(format!("Failed to get document {}: {}", id, e)))?;

    Ok(document)
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let file_size: i64 = row.get(4)?;
    let status_str: String = row.get(6)?;
    let retry_count: i64 = row.get(8)?;
    let last_processed_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    let status = status_str.parse::<DocumentStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        file_name: row.get(2)?,
        file_type: row.get(3)?,
        file_size: file_size.max(0) as u64,
        file_path: row.get(5)?,
        status,
        status_message: row.get(7)?,
        retry_count: retry_count.max(0) as u32,
        last_processed_at: last_processed_at.as_deref().and_then(parse_timestamp),
        created_at: parse_timestamp(&created_at).unwrap_or_else(Utc::now),
        updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            file_name: format!("{}.pdf", title),
            file_type: "application/pdf".to_string(),
            file_size: 1024,
            file_path: None,
        }
    }

    #[test]
    fn test_create_and_find() {
        let db = DocumentDb::in_memory().unwrap();

        let created = db.create(&upload("alpha")).unwrap();
        assert_eq!(created.status, DocumentStatus::Pending);
        assert_eq!(created.retry_count, 0);
        assert!(created.last_processed_at.is_none());

        let found = db.find_one(created.id).unwrap();
        assert_eq!(found.title, "alpha");
        assert_eq!(found.file_size, 1024);
    }

    #[test]
    fn test_find_missing() {
        let db = DocumentDb::in_memory().unwrap();
        assert!(matches!(db.find_one(99), Err(Error::NotFound(99))));
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let db = DocumentDb::in_memory().unwrap();
        let doc = db.create(&upload("beta")).unwrap();

        let updated = db
            .update(
                doc.id,
                &DocumentChanges {
                    status: Some(DocumentStatus::Failed),
                    status_message: Some("Mock processing failure".to_string()),
                    retry_count: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "beta");
        assert_eq!(updated.status, DocumentStatus::Failed);
        assert_eq!(updated.status_message.as_deref(), Some("Mock processing failure"));
        assert_eq!(updated.retry_count, 3);

        let renamed = db
            .update(
                doc.id,
                &DocumentChanges {
                    title: Some("gamma".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.title, "gamma");
        assert_eq!(renamed.status, DocumentStatus::Failed);
        assert_eq!(renamed.retry_count, 3);
    }

    #[test]
    fn test_update_missing() {
        let db = DocumentDb::in_memory().unwrap();
        let result = db.update(5, &DocumentChanges::default());
        assert!(matches!(result, Err(Error::NotFound(5))));
    }

    #[test]
    fn test_delete() {
        let db = DocumentDb::in_memory().unwrap();
        let doc = db.create(&upload("delta")).unwrap();

        db.delete(doc.id).unwrap();
        assert!(matches!(db.find_one(doc.id), Err(Error::NotFound(_))));
        assert!(matches!(db.delete(doc.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_newest_first() {
        let db = DocumentDb::in_memory().unwrap();
        let first = db.create(&upload("one")).unwrap();
        let second = db.create(&upload("two")).unwrap();

        let ids: Vec<i64> = db.find_all().unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("documents.db");

        let id = {
            let db = DocumentDb::new(&path).unwrap();
            db.create(&upload("persisted")).unwrap().id
        };

        let reopened = DocumentDb::new(&path).unwrap();
        assert_eq!(reopened.find_one(id).unwrap().title, "persisted");
    }
}
