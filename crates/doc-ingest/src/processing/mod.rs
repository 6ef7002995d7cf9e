//! Ingestion worker and its per-document job bookkeeping

pub mod status_store;
pub mod timer_registry;
pub mod worker;

pub use status_store::StatusStore;
pub use timer_registry::{JobTimerRegistry, TimerHost};
pub use worker::{IngestionWorker, WorkerStats};
