//! # podlife CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use podlife_cli::ingest::{run_ingest, IngestArgs};
use podlife_cli::migrate::{run_migrate, MigrateArgs};

/// Pod lifecycle timeline reconciler.
///
/// Turns the Kubernetes event stream into one durable record per pod with
/// the first-observed time of each lifecycle milestone.
#[derive(Parser, Debug)]
#[command(name = "podlife", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest Kubernetes events and record pod milestones.
    Ingest(IngestArgs),

    /// Apply the timeline database schema.
    Migrate(MigrateArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    podlife_cli::logging::init(cli.log_json);

    let result = match cli.command {
        Commands::Ingest(args) => run_ingest(&args).await.map(|_| ()),
        Commands::Migrate(args) => run_migrate(&args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
