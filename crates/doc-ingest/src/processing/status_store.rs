//! In-memory ingestion status records

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{IngestionStatus, StatusRecord};

struct StoredRecord {
    record: StatusRecord,
    updated_at: Instant,
}

/// Latest status record per document id
///
/// Records are volatile. Terminal records older than the TTL are dropped by
/// [`StatusStore::evict_expired`]; processing records are never evicted.
pub struct StatusStore {
    records: HashMap<i64, StoredRecord>,
    ttl: Option<Duration>,
}

impl StatusStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            records: HashMap::new(),
            ttl,
        }
    }

    /// Replace the record for a document
    pub fn set(&mut self, document_id: i64, record: StatusRecord) {
        self.records.insert(
            document_id,
            StoredRecord {
                record,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, document_id: i64) -> Option<&StatusRecord> {
        self.records.get(&document_id).map(|stored| &stored.record)
    }

    /// Current record, or the synthetic not-found answer
    pub fn lookup(&self, document_id: i64) -> StatusRecord {
        self.get(document_id)
            .cloned()
            .unwrap_or_else(StatusRecord::not_found)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records currently in the given state
    pub fn count(&self, status: IngestionStatus) -> usize {
        self.records
            .values()
            .filter(|stored| stored.record.status == status)
            .count()
    }

    /// Drop terminal records not updated within the TTL. Returns the number removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let before = self.records.len();
        self.records.retain(|_, stored| {
            !stored.record.is_terminal() || now.duration_since(stored.updated_at) < ttl
        });
        before - self.records.len()
    }
}
