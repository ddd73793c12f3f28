//! # podlife-core — Foundational Types
//!
//! Leaf crate of the podlife workspace. Defines the values that flow from
//! the event watcher into the reconciliation store:
//!
//! - [`PodUid`] / [`PodIdentity`] — the stable key of a pod timeline.
//!   Equality is by UID only; namespace and name are informational.
//! - [`Timestamp`] — UTC-only, seconds-precision instant.
//! - [`MilestoneKind`] — the closed set of lifecycle milestones.
//! - [`RawEvent`] — the minimal view of a Kubernetes `core/v1` Event.
//! - [`classify`] — the pure mapping from a raw event to a
//!   [`MilestoneEvent`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `podlife-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod classify;
pub mod error;
pub mod event;
pub mod identity;
pub mod milestone;
pub mod temporal;

pub use classify::{classify, classify_detailed, report, Classification, MalformedEvent};
pub use error::CoreError;
pub use event::RawEvent;
pub use identity::{PodIdentity, PodUid};
pub use milestone::{MilestoneEvent, MilestoneKind, MILESTONE_KIND_COUNT};
pub use temporal::Timestamp;
