//! Ingestion counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the driver loop and its workers.
#[derive(Debug, Default)]
pub struct DriverStats {
    received: AtomicU64,
    not_pod: AtomicU64,
    unknown_reason: AtomicU64,
    malformed: AtomicU64,
    source_errors: AtomicU64,
    recorded: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DriverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events pulled from the source.
    pub received: u64,
    /// Dropped: involved object is not a pod.
    pub not_pod: u64,
    /// Dropped: reason outside the milestone vocabulary.
    pub unknown_reason: u64,
    /// Dropped: missing kind, UID or timestamp.
    pub malformed: u64,
    /// Notifications the source could not decode.
    pub source_errors: u64,
    /// Merges that set a milestone.
    pub recorded: u64,
    /// Merges that found the milestone already set.
    pub duplicates: u64,
    /// Merges that failed and were dropped.
    pub failed: u64,
}

impl StatsSnapshot {
    /// Milestone events handed to the store.
    pub fn merged(&self) -> u64 {
        self.recorded + self.duplicates + self.failed
    }

    /// Events dropped before reaching the store.
    pub fn dropped(&self) -> u64 {
        self.not_pod + self.unknown_reason + self.malformed
    }
}

macro_rules! counter {
    ($($inc:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl DriverStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        inc_received => received,
        inc_not_pod => not_pod,
        inc_unknown_reason => unknown_reason,
        inc_malformed => malformed,
        inc_source_errors => source_errors,
        inc_recorded => recorded,
        inc_duplicates => duplicates,
        inc_failed => failed,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            not_pod: self.not_pod.load(Ordering::Relaxed),
            unknown_reason: self.unknown_reason.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
