//! Core types for the ingestion pipeline

pub mod document;
pub mod status;

pub use document::{
    Document, DocumentChanges, DocumentSnapshot, DocumentStatus, NewDocument, UpdateDocument,
};
pub use status::{IngestionStatus, JobAck, StatusRecord};
