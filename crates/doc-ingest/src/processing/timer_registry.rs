//! Per-document cancellable delayed actions
//!
//! The registry lives inside state shared behind a single `parking_lot::Mutex`.
//! A fired timer re-acquires that lock and only runs its action if its
//! generation is still the current one for the document, so a superseded timer
//! that already woke up cannot write anything.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared state that owns a [`JobTimerRegistry`]
pub trait TimerHost: Send + 'static {
    fn timers(&mut self) -> &mut JobTimerRegistry;
}

struct ScheduledJob {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Scheduler holding at most one live timer per document id
#[derive(Default)]
pub struct JobTimerRegistry {
    jobs: HashMap<i64, ScheduledJob>,
    next_generation: u64,
}

impl JobTimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run against the shared state after `delay`.
    ///
    /// Must be called with the lock on `shared` held (`self` borrowed from it).
    /// Any earlier timer for `document_id` is cancelled first. Returns `true`
    /// when an earlier timer was superseded.
    pub fn schedule<S, F>(
        &mut self,
        shared: &Arc<Mutex<S>>,
        document_id: i64,
        delay: Duration,
        action: F,
    ) -> bool
    where
        S: TimerHost,
        F: FnOnce(&mut S) + Send + 'static,
    {
        let superseded = self.cancel(document_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let shared = Arc::clone(shared);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = shared.lock();
            if state.timers().finish(document_id, generation) {
                action(&mut *state);
            } else {
                tracing::debug!(
                    "Discarding superseded timer for document {} (generation {})",
                    document_id,
                    generation
                );
            }
        });

        self.jobs.insert(document_id, ScheduledJob { generation, handle });
        superseded
    }

    /// Cancel the live timer for a document. No-op if none is scheduled.
    pub fn cancel(&mut self, document_id: i64) -> bool {
        match self.jobs.remove(&document_id) {
            Some(job) => {
                job.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every live timer, returning how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let count = self.jobs.len();
        for (_, job) in self.jobs.drain() {
            job.handle.abort();
        }
        count
    }

    pub fn is_scheduled(&self, document_id: i64) -> bool {
        self.jobs.contains_key(&document_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Remove the entry if `generation` is still current for the document
    fn finish(&mut self, document_id: i64, generation: u64) -> bool {
        match self.jobs.get(&document_id) {
            Some(job) if job.generation == generation => {
                self.jobs.remove(&document_id);
                true
            }
            _ => false,
        }
    }
}
