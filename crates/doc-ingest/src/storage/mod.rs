//! Document persistence
//!
//! The coordinator only depends on [`DocumentStore`]; [`DocumentDb`] is the
//! SQLite implementation used by the server binary.

mod database;

pub use database::DocumentDb;

use crate::error::Result;
use crate::types::{Document, DocumentChanges, NewDocument};

/// Trait for document persistence
///
/// `find_one`, `update` and `delete` fail with `Error::NotFound` for unknown ids.
pub trait DocumentStore: Send + Sync {
    /// Insert a new PENDING document
    fn create(&self, document: &NewDocument) -> Result<Document>;

    /// All documents, newest first
    fn find_all(&self) -> Result<Vec<Document>>;

    /// Load a document by id
    fn find_one(&self, id: i64) -> Result<Document>;

    /// Apply field changes and return the updated document
    fn update(&self, id: i64, changes: &DocumentChanges) -> Result<Document>;

    /// Remove a document
    fn delete(&self, id: i64) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}
