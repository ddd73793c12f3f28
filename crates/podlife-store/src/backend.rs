//! # Record Backends
//!
//! A [`RecordBackend`] is the persistence seam under the reconciliation
//! store: primary-key load and revision-checked save. It holds no merge
//! logic of its own.
//!
//! ## Revision protocol
//!
//! Every persisted record carries a [`Revision`], starting at 1 on insert
//! and incremented by each save. A save names the revision it read:
//!
//! - [`Revision::ABSENT`] means "I read nothing"; the save inserts and
//!   fails with [`StoreError::Conflict`] if the record appeared meanwhile.
//! - Any other revision means "I read this version"; the save updates and
//!   fails with [`StoreError::Conflict`] if the stored revision moved on.
//!
//! A failed save leaves the stored record untouched.

use std::future::Future;

use podlife_core::PodUid;
use podlife_state::LifecycleRecord;

use crate::error::StoreError;

/// Version counter of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(u64);

impl Revision {
    /// The revision of a record that has never been saved.
    pub const ABSENT: Revision = Revision(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The revision a successful save of this revision produces.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn is_absent(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A persisted record together with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord {
    pub record: LifecycleRecord,
    pub revision: Revision,
}

/// Keyed persistence for lifecycle records.
///
/// Implementations must be `Send + Sync` so a single backend can serve
/// merges running on many tasks.
pub trait RecordBackend: Send + Sync + 'static {
    /// Fetch the record for `uid`, if one was ever saved.
    fn load(
        &self,
        uid: &PodUid,
    ) -> impl Future<Output = Result<Option<VersionedRecord>, StoreError>> + Send;

    /// Persist `record` if the stored revision still equals `expected`.
    /// Returns the new revision.
    fn save(
        &self,
        record: &LifecycleRecord,
        expected: Revision,
    ) -> impl Future<Output = Result<Revision, StoreError>> + Send;

    /// Short backend name for log lines.
    fn kind(&self) -> &'static str;
}
