//! # podlife-cli — Command-Line Interface
//!
//! ## Subcommands
//!
//! - `ingest` — read Kubernetes Event JSON and merge pod milestones into
//!   lifecycle timelines (PostgreSQL if configured, memory otherwise)
//! - `migrate` — apply the timeline database schema
//!
//! Argument parsing lives here next to each handler; the handlers delegate
//! to `podlife-store` and `podlife-driver` for everything else.

pub mod ingest;
pub mod logging;
pub mod migrate;

use podlife_store::StoreConfig;

/// Storage settings from the environment, with a command-line URL taking
/// precedence over `DATABASE_URL`.
pub fn store_config(database_url: Option<&str>) -> StoreConfig {
    let config = StoreConfig::from_env();
    match database_url {
        Some(url) => config.with_database_url(url),
        None => config,
    }
}
