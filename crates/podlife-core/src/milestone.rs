//! # Milestone Kinds
//!
//! The closed vocabulary of pod lifecycle milestones. Each kind is keyed by
//! the Kubernetes event `reason` that announces it and owns exactly one
//! timestamp slot in a pod's lifecycle record.
//!
//! | Reason | Kind | Column |
//! |---|---|---|
//! | `Scheduled` | [`MilestoneKind::Scheduled`] | `scheduled` |
//! | `AllocIPSucceed` | [`MilestoneKind::NetworkReady`] | `network_ready` |
//! | `Pulling` | [`MilestoneKind::PullStarted`] | `pull_started` |
//! | `Pulled` | [`MilestoneKind::PullFinished`] | `pull_finished` |
//! | `Created` | [`MilestoneKind::ContainerCreated`] | `container_created` |
//! | `Started` | [`MilestoneKind::ContainerStarted`] | `container_started` |
//! | `Killing` | [`MilestoneKind::Killing`] | `killing` |
//!
//! Adding a kind forces every exhaustive `match` downstream (record slots,
//! SQL row mapping) to handle it.

use serde::{Deserialize, Serialize};

use crate::identity::PodIdentity;
use crate::temporal::Timestamp;

/// Number of milestone kinds.
pub const MILESTONE_KIND_COUNT: usize = 7;

/// A named pod lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    /// The scheduler bound the pod to a node.
    Scheduled,
    /// The CNI plugin allocated the pod IP.
    NetworkReady,
    /// The kubelet started pulling an image.
    PullStarted,
    /// The kubelet finished pulling an image.
    PullFinished,
    /// A container was created.
    ContainerCreated,
    /// A container was started.
    ContainerStarted,
    /// The kubelet began killing a container.
    Killing,
}

impl MilestoneKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [MilestoneKind; MILESTONE_KIND_COUNT] = [
        Self::Scheduled,
        Self::NetworkReady,
        Self::PullStarted,
        Self::PullFinished,
        Self::ContainerCreated,
        Self::ContainerStarted,
        Self::Killing,
    ];

    /// Map an event `reason` to its milestone. Matching is exact and
    /// case-sensitive, as reasons are machine-generated constants.
    pub fn from_reason(reason: &str) -> Option<Self> {
        match reason {
            "Scheduled" => Some(Self::Scheduled),
            "AllocIPSucceed" => Some(Self::NetworkReady),
            "Pulling" => Some(Self::PullStarted),
            "Pulled" => Some(Self::PullFinished),
            "Created" => Some(Self::ContainerCreated),
            "Started" => Some(Self::ContainerStarted),
            "Killing" => Some(Self::Killing),
            _ => None,
        }
    }

    /// The event `reason` announcing this milestone.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::NetworkReady => "AllocIPSucceed",
            Self::PullStarted => "Pulling",
            Self::PullFinished => "Pulled",
            Self::ContainerCreated => "Created",
            Self::ContainerStarted => "Started",
            Self::Killing => "Killing",
        }
    }

    /// Snake-case name; doubles as the storage column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::NetworkReady => "network_ready",
            Self::PullStarted => "pull_started",
            Self::PullFinished => "pull_finished",
            Self::ContainerCreated => "container_created",
            Self::ContainerStarted => "container_started",
            Self::Killing => "killing",
        }
    }
}

impl std::fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified observation: this pod reached this milestone at this time.
///
/// Produced by the classifier and consumed immediately by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneEvent {
    /// The pod the event is about.
    pub identity: PodIdentity,
    /// Which milestone was reached.
    pub kind: MilestoneKind,
    /// When the milestone was first observed.
    pub at: Timestamp,
}

impl MilestoneEvent {
    pub fn new(identity: PodIdentity, kind: MilestoneKind, at: Timestamp) -> Self {
        Self { identity, kind, at }
    }
}
