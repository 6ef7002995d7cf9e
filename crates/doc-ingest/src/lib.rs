//! doc-ingest: Document registry with asynchronous, cancellable ingestion
//!
//! Documents are stored in SQLite and handed to an ingestion worker over a
//! line-delimited JSON command channel. The worker simulates processing with a
//! random delay and outcome, keeps one live job per document and reports the
//! latest status on request. Terminal outcomes are written back to the stored
//! document when a client polls for status.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod processing;
pub mod server;
pub mod storage;
pub mod transport;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use lifecycle::{Dispatch, DocumentCoordinator};
pub use processing::IngestionWorker;
pub use transport::{IngestionChannel, IngestionClient, LocalChannel};
pub use types::{
    document::{Document, DocumentStatus, NewDocument, UpdateDocument},
    status::{IngestionStatus, JobAck, StatusRecord},
};
