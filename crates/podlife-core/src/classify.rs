//! # Milestone Classifier
//!
//! Pure mapping from a delivered [`RawEvent`] to the [`MilestoneEvent`] it
//! announces. Stateless and free of shared data, so it can run on any
//! number of tasks without synchronization.
//!
//! Checks run in this order, first failure wins:
//!
//! 1. Involved-object kind present, else [`MalformedEvent::MissingKind`].
//! 2. Kind is `Pod`, else [`Classification::NotPod`].
//! 3. Reason is in the milestone vocabulary, else
//!    [`Classification::UnknownReason`].
//! 4. UID present, else [`MalformedEvent::MissingUid`].
//! 5. First-observed time present, else [`MalformedEvent::MissingTimestamp`].
//!
//! Only malformed input is worth a warning. Non-pod kinds and unknown
//! reasons are the normal case for most of a cluster's event traffic.

use crate::event::RawEvent;
use crate::identity::{PodIdentity, PodUid};
use crate::milestone::{MilestoneEvent, MilestoneKind};

/// Kind string of the only involved object the classifier accepts.
pub const POD_KIND: &str = "Pod";

/// Why an event could not be turned into a milestone despite targeting a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEvent {
    #[error("involved object kind is missing")]
    MissingKind,
    #[error("involved object uid is missing")]
    MissingUid,
    #[error("event carries no first-observed timestamp")]
    MissingTimestamp,
}

/// Outcome of classifying one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The event announces a pod milestone.
    Milestone(MilestoneEvent),
    /// The event is about some other kind of object.
    NotPod { kind: String },
    /// The reason is outside the milestone vocabulary.
    UnknownReason { reason: String },
    /// The event is unusable.
    Malformed(MalformedEvent),
}

impl Classification {
    /// The milestone, if any.
    pub fn into_milestone(self) -> Option<MilestoneEvent> {
        match self {
            Self::Milestone(m) => Some(m),
            _ => None,
        }
    }
}

/// Classify without logging. See the module docs for the check order.
pub fn classify_detailed(event: &RawEvent) -> Classification {
    if event.involved_kind.is_empty() {
        return Classification::Malformed(MalformedEvent::MissingKind);
    }
    if event.involved_kind != POD_KIND {
        return Classification::NotPod {
            kind: event.involved_kind.clone(),
        };
    }
    let Some(kind) = MilestoneKind::from_reason(&event.reason) else {
        return Classification::UnknownReason {
            reason: event.reason.clone(),
        };
    };
    let Ok(uid) = PodUid::new(event.involved_uid.as_str()) else {
        return Classification::Malformed(MalformedEvent::MissingUid);
    };
    let Some(at) = event.first_observed else {
        return Classification::Malformed(MalformedEvent::MissingTimestamp);
    };

    let identity = PodIdentity::new(
        uid,
        event.involved_namespace.as_str(),
        event.involved_name.as_str(),
    );
    Classification::Milestone(MilestoneEvent::new(identity, kind, at))
}

/// Classify a raw event, logging anything that is dropped.
///
/// Returns `None` for non-pod objects and unknown reasons (debug log) and
/// for malformed events (warning). Never fails.
pub fn classify(event: &RawEvent) -> Option<MilestoneEvent> {
    let classification = classify_detailed(event);
    report(event, &classification);
    classification.into_milestone()
}

/// Log why `event` was dropped, if it was.
pub fn report(event: &RawEvent, classification: &Classification) {
    match classification {
        Classification::Milestone(_) => {}
        Classification::NotPod { kind } => {
            tracing::debug!(kind = %kind, reason = %event.reason, "ignoring non-pod event");
        }
        Classification::UnknownReason { reason } => {
            tracing::debug!(
                reason = %reason,
                namespace = %event.involved_namespace,
                name = %event.involved_name,
                "event reason not supported"
            );
        }
        Classification::Malformed(defect) => {
            tracing::warn!(
                reason = %event.reason,
                uid = %event.involved_uid,
                "dropping malformed event: {defect}"
            );
        }
    }
}
