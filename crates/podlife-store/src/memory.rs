//! # In-Memory Backend
//!
//! Process-local [`RecordBackend`]. Used by tests and by `podlife ingest`
//! when no database is configured. Contents do not survive the process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use podlife_core::PodUid;
use podlife_state::LifecycleRecord;

use crate::backend::{RecordBackend, Revision, VersionedRecord};
use crate::error::StoreError;

/// Thread-safe, cloneable in-memory record map.
///
/// Clones share the same underlying map. The lock is `parking_lot` and is
/// never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<HashMap<PodUid, VersionedRecord>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for `uid`, without its revision.
    pub fn get(&self, uid: &PodUid) -> Option<LifecycleRecord> {
        self.records.read().get(uid).map(|v| v.record.clone())
    }

    /// Current revision for `uid`; [`Revision::ABSENT`] if never saved.
    pub fn revision(&self, uid: &PodUid) -> Revision {
        self.records
            .read()
            .get(uid)
            .map(|v| v.revision)
            .unwrap_or(Revision::ABSENT)
    }

    /// All records, ordered by UID.
    pub fn snapshot(&self) -> Vec<LifecycleRecord> {
        let mut records: Vec<_> = self
            .records
            .read()
            .values()
            .map(|v| v.record.clone())
            .collect();
        records.sort_by(|a, b| a.uid().cmp(b.uid()));
        records
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordBackend for MemoryBackend {
    async fn load(&self, uid: &PodUid) -> Result<Option<VersionedRecord>, StoreError> {
        Ok(self.records.read().get(uid).cloned())
    }

    async fn save(
        &self,
        record: &LifecycleRecord,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let mut records = self.records.write();
        let current = records
            .get(record.uid())
            .map(|v| v.revision)
            .unwrap_or(Revision::ABSENT);
        if current != expected {
            return Err(StoreError::Conflict {
                uid: record.uid().clone(),
                expected,
            });
        }
        let revision = expected.next();
        records.insert(
            record.uid().clone(),
            VersionedRecord {
                record: record.clone(),
                revision,
            },
        );
        Ok(revision)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
