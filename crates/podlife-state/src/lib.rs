//! # podlife-state — Pod Lifecycle Records
//!
//! A [`LifecycleRecord`] is the durable timeline of one pod: its identity
//! plus one optional timestamp per [`MilestoneKind`](podlife_core::MilestoneKind).
//!
//! ## Merge Law
//!
//! Folding an observation into a record obeys two invariants:
//!
//! - **Write-once per field.** A milestone slot that already holds a value
//!   is never changed, whether the incoming time is earlier, later, or
//!   equal. The first observation wins, independent of event time order.
//! - **Identity stability.** The UID of a record never changes. Namespace
//!   and name are informational and follow the latest non-empty observation.
//!
//! Slots are addressed by an exhaustive `match` on the milestone kind, and
//! presence is tracked with `Option`, so an observed epoch-zero time is
//! distinguishable from "never observed".

pub mod record;

pub use record::{LifecycleRecord, MergeOutcome, Milestones, StateError};
