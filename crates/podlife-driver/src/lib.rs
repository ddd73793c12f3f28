//! # podlife-driver — Event Ingestion
//!
//! Connects an [`EventSource`] to a
//! [`ReconciliationStore`](podlife_store::ReconciliationStore):
//!
//! ```text
//!   EventSource ──▶ classify ──▶ shard by UID ──▶ worker N ──▶ store.merge
//!                      │                            (one per shard,
//!                      └─ dropped (counted)          FIFO per pod)
//! ```
//!
//! Every event with the same pod UID lands on the same worker, so the
//! order events are delivered in is the order they are merged in. Pods on
//! different workers merge concurrently.
//!
//! Shutdown stops pulling from the source; events already handed to a
//! worker are merged before [`ReconciliationDriver::run_until`] returns.

pub mod config;
pub mod driver;
pub mod error;
pub mod source;
pub mod stats;

pub use config::DriverConfig;
pub use driver::ReconciliationDriver;
pub use error::SourceError;
pub use source::{ChannelSource, EventSource, JsonStreamSource};
pub use stats::{DriverStats, StatsSnapshot};
