//! Simulated ingestion worker
//!
//! Each `start_ingestion` draws a delay and an outcome up front, records the
//! document as PROCESSING and schedules the terminal transition on the timer
//! registry. A resubmission cancels the pending transition, so a document has
//! at most one live job.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::status_store::StatusStore;
use super::timer_registry::{JobTimerRegistry, TimerHost};
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::types::{DocumentSnapshot, IngestionStatus, JobAck, StatusRecord};

struct WorkerState {
    timers: JobTimerRegistry,
    statuses: StatusStore,
    rng: StdRng,
}

impl TimerHost for WorkerState {
    fn timers(&mut self) -> &mut JobTimerRegistry {
        &mut self.timers
    }
}

/// Point-in-time worker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub active_jobs: usize,
    pub records: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-process ingestion worker
pub struct IngestionWorker {
    shared: Arc<Mutex<WorkerState>>,
    min_delay_ms: u64,
    max_delay_ms: u64,
    success_probability: f64,
    sweep_interval: Duration,
}

impl IngestionWorker {
    /// Create a worker from configuration
    pub fn new(config: &WorkerConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            shared: Arc::new(Mutex::new(WorkerState {
                timers: JobTimerRegistry::new(),
                statuses: StatusStore::new(config.status_ttl()),
                rng,
            })),
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            success_probability: config.success_probability,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        })
    }

    /// Create a worker with a fixed seed, overriding any seed in `config`
    pub fn with_seed(config: &WorkerConfig, seed: u64) -> Result<Self> {
        let config = WorkerConfig {
            seed: Some(seed),
            ..config.clone()
        };
        Self::new(&config)
    }

    /// Accept a document for processing. Never blocks on the work itself.
    pub fn start_ingestion(&self, document: &DocumentSnapshot) -> JobAck {
        let document_id = document.id;
        let mut state = self.shared.lock();

        let delay_ms = state.rng.gen_range(self.min_delay_ms..self.max_delay_ms);
        let will_succeed = state.rng.gen_bool(self.success_probability);

        state.statuses.set(document_id, StatusRecord::processing(document_id));

        let delay = Duration::from_millis(delay_ms);
        let superseded = state.timers.schedule(
            &self.shared,
            document_id,
            delay,
            move |state: &mut WorkerState| {
                if will_succeed {
                    state.statuses.set(document_id, StatusRecord::completed(document_id));
                    tracing::info!("Document {} processed successfully", document_id);
                } else {
                    state.statuses.set(document_id, StatusRecord::failed(document_id));
                    tracing::warn!("Document {} processing failed", document_id);
                }
            },
        );

        if superseded {
            tracing::info!(
                "Restarted ingestion for document {} (cancelled previous job)",
                document_id
            );
        }
        tracing::info!(
            "Started ingestion for document {} ({}), completes in {}ms",
            document_id,
            document.title().unwrap_or("untitled"),
            delay_ms
        );

        JobAck::accepted(document_id)
    }

    /// Last known status for a document
    pub fn get_status(&self, document_id: i64) -> StatusRecord {
        self.shared.lock().statuses.lookup(document_id)
    }

    /// Drop expired terminal records now
    pub fn evict_expired(&self) -> usize {
        self.shared.lock().statuses.evict_expired(Instant::now())
    }

    /// Run `evict_expired` periodically until the worker is dropped.
    ///
    /// Returns `None` when no TTL is configured.
    pub fn spawn_eviction_sweep(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.shared.lock().statuses.ttl().is_none() {
            return None;
        }

        let worker: Weak<Self> = Arc::downgrade(self);
        let period = self.sweep_interval;

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(worker) = worker.upgrade() else {
                    break;
                };

                let evicted = worker.evict_expired();
                if evicted > 0 {
                    tracing::debug!("Evicted {} expired status records", evicted);
                }
            }
        }))
    }

    /// Number of jobs with a pending terminal transition
    pub fn active_jobs(&self) -> usize {
        self.shared.lock().timers.len()
    }

    pub fn stats(&self) -> WorkerStats {
        let state = self.shared.lock();
        WorkerStats {
            active_jobs: state.timers.len(),
            records: state.statuses.len(),
            processing: state.statuses.count(IngestionStatus::Processing),
            completed: state.statuses.count(IngestionStatus::Completed),
            failed: state.statuses.count(IngestionStatus::Failed),
        }
    }

    /// Cancel every pending job. Status records are kept.
    pub fn shutdown(&self) {
        let cancelled = self.shared.lock().timers.cancel_all();
        if cancelled > 0 {
            tracing::info!("Cancelled {} pending ingestion jobs", cancelled);
        }
    }
}

impl Drop for IngestionWorker {
    fn drop(&mut self) {
        self.shared.lock().timers.cancel_all();
    }
}
