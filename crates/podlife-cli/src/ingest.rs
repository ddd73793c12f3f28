//! # Ingest Subcommand
//!
//! Reads Kubernetes Event JSON from a file or stdin, classifies each event
//! and merges pod milestones into lifecycle timelines. Runs until the input
//! ends or Ctrl-C; either way, events already taken from the input are
//! merged before the command exits.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use podlife_driver::{DriverConfig, JsonStreamSource, ReconciliationDriver, StatsSnapshot};
use podlife_state::LifecycleRecord;
use podlife_store::{
    postgres, MemoryBackend, PgBackend, ReconciliationStore, RecordBackend, StoreConfig,
};

/// Arguments for the ingest subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Event JSON to read: `kubectl get events -o json` output, a
    /// `--watch` stream, or API watch envelopes. `-` reads stdin.
    #[arg(long, short, default_value = "-")]
    pub input: PathBuf,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    pub database_url: Option<String>,

    /// Number of merge workers. Overrides `PODLIFE_WORKERS`.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Print every stored timeline to stdout as a JSON line when done.
    #[arg(long)]
    pub dump: bool,
}

impl IngestArgs {
    fn driver_config(&self, base: DriverConfig) -> DriverConfig {
        match self.workers {
            Some(workers) => base.with_workers(workers),
            None => base,
        }
    }
}

/// Entry point used by the binary: configuration from the environment,
/// Ctrl-C for shutdown, dump to stdout.
pub async fn run_ingest(args: &IngestArgs) -> anyhow::Result<StatsSnapshot> {
    let store_config = crate::store_config(args.database_url.as_deref());
    let driver_config = args.driver_config(DriverConfig::from_env());
    execute(
        args,
        &store_config,
        driver_config,
        shutdown_signal(),
        &mut std::io::stdout(),
    )
    .await
}

/// Run one ingestion with explicit configuration.
pub async fn execute<F, W>(
    args: &IngestArgs,
    store_config: &StoreConfig,
    driver_config: DriverConfig,
    shutdown: F,
    out: &mut W,
) -> anyhow::Result<StatsSnapshot>
where
    F: Future<Output = ()>,
    W: Write,
{
    let source = open_input(&args.input)?;

    match postgres::connect(store_config)
        .await
        .context("failed to connect to PostgreSQL")?
    {
        Some(pool) => {
            postgres::migrate(&pool)
                .await
                .context("failed to apply database migrations")?;
            let (store, stats) = ingest(
                PgBackend::new(pool),
                store_config,
                driver_config,
                source,
                shutdown,
            )
            .await;
            if args.dump {
                let records = store.backend().load_all().await?;
                dump(out, &records)?;
            }
            Ok(stats)
        }
        None => {
            let (store, stats) = ingest(
                MemoryBackend::new(),
                store_config,
                driver_config,
                source,
                shutdown,
            )
            .await;
            if args.dump {
                dump(out, &store.backend().snapshot())?;
            }
            Ok(stats)
        }
    }
}

async fn ingest<B, F>(
    backend: B,
    store_config: &StoreConfig,
    driver_config: DriverConfig,
    source: JsonStreamSource,
    shutdown: F,
) -> (Arc<ReconciliationStore<B>>, StatsSnapshot)
where
    B: RecordBackend,
    F: Future<Output = ()>,
{
    let store = Arc::new(ReconciliationStore::with_retry(backend, store_config.retry));
    let driver = ReconciliationDriver::new(Arc::clone(&store), driver_config);
    let stats = driver.run_until(source, shutdown).await;
    (store, stats)
}

fn open_input(input: &Path) -> anyhow::Result<JsonStreamSource> {
    if input.as_os_str() == "-" {
        tracing::info!("reading events from stdin");
        return JsonStreamSource::stdin().context("failed to start stdin reader");
    }
    tracing::info!(path = %input.display(), "reading events from file");
    JsonStreamSource::from_path(input)
        .with_context(|| format!("failed to open {}", input.display()))
}

/// Write one JSON object per record.
fn dump<W: Write>(out: &mut W, records: &[LifecycleRecord]) -> anyhow::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Completes on Ctrl-C. If the handler cannot be installed, never
/// completes and ingestion runs to the end of input.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl-C"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C, stopping at end of input only");
            std::future::pending::<()>().await;
        }
    }
}
