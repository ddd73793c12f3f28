//! # podlife-store — Pod Lifecycle Storage
//!
//! Persists one [`LifecycleRecord`](podlife_state::LifecycleRecord) per pod
//! and exposes the single write path the rest of the system uses:
//! [`ReconciliationStore::merge`].
//!
//! ## Architecture
//!
//! ```text
//!   MilestoneEvent
//!         │
//!         ▼
//!   ReconciliationStore ── KeyedLocks (one async mutex per pod UID)
//!         │                 RetryPolicy (bounded backoff on conflicts)
//!         ▼
//!   RecordBackend ── MemoryBackend  (process-local, tests and dry runs)
//!                 └─ PgBackend      (PostgreSQL via sqlx)
//! ```
//!
//! Merges for the same pod are serialized in-process by [`KeyedLocks`].
//! Backends additionally check a per-record [`Revision`] on every save, so
//! several processes sharing one database cannot lose each other's
//! updates: a stale save is rejected with [`StoreError::Conflict`] and the
//! store re-reads and retries. Merges for different pods never contend.

pub mod backend;
pub mod config;
pub mod error;
pub mod locks;
pub mod memory;
pub mod postgres;
pub mod reconcile;
pub mod retry;

pub use backend::{RecordBackend, Revision, VersionedRecord};
pub use config::StoreConfig;
pub use error::StoreError;
pub use locks::KeyedLocks;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;
pub use reconcile::ReconciliationStore;
pub use retry::RetryPolicy;
