//! # Migrate Subcommand
//!
//! Applies the embedded schema to the configured database. `ingest` does
//! the same on startup; this exists for deployments that run schema
//! changes as a separate step.

use anyhow::Context;
use clap::Args;
use podlife_store::{postgres, PgBackend};

/// Arguments for the migrate subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: &MigrateArgs) -> anyhow::Result<()> {
    let config = crate::store_config(args.database_url.as_deref());
    if config.database_url.is_none() {
        anyhow::bail!("no database configured: set DATABASE_URL or pass --database-url");
    }

    let pool = postgres::connect(&config)
        .await
        .context("failed to connect to PostgreSQL")?
        .context("no database configured")?;
    postgres::migrate(&pool)
        .await
        .context("failed to apply database migrations")?;

    let records = PgBackend::new(pool).count().await?;
    tracing::info!(records, "pod_lifecycle schema is up to date");
    Ok(())
}
