//! # Lifecycle Record
//!
//! The per-pod timeline and the operations that mutate it. Every mutation
//! goes through [`merge_slot`], the single place the write-once rule lives.

use podlife_core::{MilestoneEvent, MilestoneKind, PodIdentity, PodUid, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from record mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// An observation for one pod was applied to another pod's record.
    #[error("observation for pod {incoming} cannot be merged into record of pod {record}")]
    IdentityMismatch {
        /// UID of the record being mutated.
        record: PodUid,
        /// UID carried by the observation.
        incoming: PodUid,
    },
}

/// One optional timestamp per milestone kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
    pub scheduled: Option<Timestamp>,
    pub network_ready: Option<Timestamp>,
    pub pull_started: Option<Timestamp>,
    pub pull_finished: Option<Timestamp>,
    pub container_created: Option<Timestamp>,
    pub container_started: Option<Timestamp>,
    pub killing: Option<Timestamp>,
}

impl Milestones {
    /// The recorded time for `kind`, if observed.
    pub fn get(&self, kind: MilestoneKind) -> Option<Timestamp> {
        match kind {
            MilestoneKind::Scheduled => self.scheduled,
            MilestoneKind::NetworkReady => self.network_ready,
            MilestoneKind::PullStarted => self.pull_started,
            MilestoneKind::PullFinished => self.pull_finished,
            MilestoneKind::ContainerCreated => self.container_created,
            MilestoneKind::ContainerStarted => self.container_started,
            MilestoneKind::Killing => self.killing,
        }
    }

    fn slot_mut(&mut self, kind: MilestoneKind) -> &mut Option<Timestamp> {
        match kind {
            MilestoneKind::Scheduled => &mut self.scheduled,
            MilestoneKind::NetworkReady => &mut self.network_ready,
            MilestoneKind::PullStarted => &mut self.pull_started,
            MilestoneKind::PullFinished => &mut self.pull_finished,
            MilestoneKind::ContainerCreated => &mut self.container_created,
            MilestoneKind::ContainerStarted => &mut self.container_started,
            MilestoneKind::Killing => &mut self.killing,
        }
    }

    /// `(kind, value)` for every kind, in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = (MilestoneKind, Option<Timestamp>)> + '_ {
        MilestoneKind::ALL.into_iter().map(|k| (k, self.get(k)))
    }

    /// Number of observed milestones.
    pub fn observed(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// Result of folding one observation into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The slot was empty and now holds the incoming time.
    Recorded { kind: MilestoneKind, at: Timestamp },
    /// The slot already held a value; it was left untouched.
    AlreadySet {
        kind: MilestoneKind,
        existing: Timestamp,
        incoming: Timestamp,
    },
}

impl MergeOutcome {
    pub fn kind(&self) -> MilestoneKind {
        match self {
            Self::Recorded { kind, .. } | Self::AlreadySet { kind, .. } => *kind,
        }
    }

    /// Whether the merge wrote a new value.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }

    /// The value held by the slot after the merge.
    pub fn stored(&self) -> Timestamp {
        match self {
            Self::Recorded { at, .. } => *at,
            Self::AlreadySet { existing, .. } => *existing,
        }
    }
}

/// Write-once assignment: fill an empty slot, never touch a filled one.
fn merge_slot(
    slot: &mut Option<Timestamp>,
    kind: MilestoneKind,
    incoming: Timestamp,
) -> MergeOutcome {
    match *slot {
        Some(existing) => MergeOutcome::AlreadySet {
            kind,
            existing,
            incoming,
        },
        None => {
            *slot = Some(incoming);
            MergeOutcome::Recorded { kind, at: incoming }
        }
    }
}

/// The milestone timeline of one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    identity: PodIdentity,
    milestones: Milestones,
}

impl LifecycleRecord {
    /// A record with no observed milestones.
    pub fn new(identity: PodIdentity) -> Self {
        Self {
            identity,
            milestones: Milestones::default(),
        }
    }

    /// Rebuild a record from persisted parts.
    pub fn from_parts(identity: PodIdentity, milestones: Milestones) -> Self {
        Self {
            identity,
            milestones,
        }
    }

    pub fn identity(&self) -> &PodIdentity {
        &self.identity
    }

    pub fn uid(&self) -> &PodUid {
        &self.identity.uid
    }

    pub fn milestones(&self) -> &Milestones {
        &self.milestones
    }

    /// The recorded time for `kind`, if observed.
    pub fn get(&self, kind: MilestoneKind) -> Option<Timestamp> {
        self.milestones.get(kind)
    }

    /// Fold a classified observation into this record.
    ///
    /// Fills the targeted slot if it is empty and refreshes namespace/name
    /// from the observation. Every other slot is left untouched.
    ///
    /// # Errors
    ///
    /// [`StateError::IdentityMismatch`] if the observation is for a
    /// different pod. The record is not modified in that case.
    pub fn apply(&mut self, event: &MilestoneEvent) -> Result<MergeOutcome, StateError> {
        self.ensure_same_pod(&event.identity)?;
        self.refresh_identity(&event.identity);
        Ok(merge_slot(
            self.milestones.slot_mut(event.kind),
            event.kind,
            event.at,
        ))
    }

    /// Fold a partial record into this one, slot by slot.
    ///
    /// Returns the kinds that were newly recorded.
    pub fn absorb(&mut self, partial: &LifecycleRecord) -> Result<Vec<MilestoneKind>, StateError> {
        self.ensure_same_pod(&partial.identity)?;
        self.refresh_identity(&partial.identity);
        let mut recorded = Vec::new();
        for (kind, value) in partial.milestones.iter() {
            let Some(incoming) = value else { continue };
            if merge_slot(self.milestones.slot_mut(kind), kind, incoming).is_recorded() {
                recorded.push(kind);
            }
        }
        Ok(recorded)
    }

    fn ensure_same_pod(&self, incoming: &PodIdentity) -> Result<(), StateError> {
        if self.identity.uid != incoming.uid {
            return Err(StateError::IdentityMismatch {
                record: self.identity.uid.clone(),
                incoming: incoming.uid.clone(),
            });
        }
        Ok(())
    }

    fn refresh_identity(&mut self, incoming: &PodIdentity) {
        if !incoming.namespace.is_empty() {
            self.identity.namespace.clone_from(&incoming.namespace);
        }
        if !incoming.name.is_empty() {
            self.identity.name.clone_from(&incoming.name);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn kind() -> impl Strategy<Value = MilestoneKind> {
        (0..MilestoneKind::ALL.len()).prop_map(|i| MilestoneKind::ALL[i])
    }

    fn observation() -> impl Strategy<Value = (MilestoneKind, i64)> {
        (kind(), 0i64..2_000_000_000)
    }

    fn apply_all(ops: &[(MilestoneKind, i64)]) -> LifecycleRecord {
        let identity = PodIdentity::new(PodUid::new("42").unwrap(), "ns", "pod");
        let mut record = LifecycleRecord::new(identity.clone());
        for (kind, secs) in ops {
            let at = Timestamp::from_epoch_secs(*secs).unwrap();
            record
                .apply(&MilestoneEvent::new(identity.clone(), *kind, at))
                .unwrap();
        }
        record
    }

    proptest! {
        /// Each slot holds the time of the first observation of its kind.
        #[test]
        fn first_observation_wins(ops in prop::collection::vec(observation(), 0..32)) {
            let record = apply_all(&ops);
            for kind in MilestoneKind::ALL {
                let expected = ops
                    .iter()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, s)| Timestamp::from_epoch_secs(*s).unwrap());
                prop_assert_eq!(record.get(kind), expected);
            }
        }

        /// Applying every observation twice equals applying it once.
        #[test]
        fn merge_is_idempotent(ops in prop::collection::vec(observation(), 0..32)) {
            let doubled: Vec<_> = ops.iter().flat_map(|op| [*op, *op]).collect();
            prop_assert_eq!(apply_all(&doubled), apply_all(&ops));
        }

        /// Observations of one kind never affect another kind's slot.
        #[test]
        fn kinds_are_independent(
            ops in prop::collection::vec(observation(), 0..32),
            target in kind(),
        ) {
            let only_target: Vec<_> = ops.iter().copied().filter(|(k, _)| *k == target).collect();
            prop_assert_eq!(apply_all(&ops).get(target), apply_all(&only_target).get(target));
        }

        /// A set slot never becomes unset.
        #[test]
        fn slots_are_never_cleared(ops in prop::collection::vec(observation(), 1..32)) {
            for n in 1..=ops.len() {
                let before = apply_all(&ops[..n - 1]);
                let after = apply_all(&ops[..n]);
                for kind in MilestoneKind::ALL {
                    if let Some(v) = before.get(kind) {
                        prop_assert_eq!(after.get(kind), Some(v));
                    }
                }
            }
        }
    }
}
