//! Replicator: copy an asset hierarchy from one project into another.
//!
//! # Usage
//!
//! ```text
//! replicator replicate [--config <path>] [--dry-run] [--json]
//!                      [--delete-replicated-if-not-in-source]
//!                      [--delete-not-replicated-in-destination]
//! replicator status [--config <path>] [--json]
//! replicator diff [--config <path>]
//! ```
//!
//! The config file defaults to `~/.replicator/replicator.yaml`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, replicate::ReplicateArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "replicator",
    version,
    about = "Replicate asset hierarchies between projects",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy or update every source asset into the destination.
    Replicate(ReplicateArgs),

    /// Show asset counts for the configured source and destination.
    Status(StatusArgs),

    /// Show what a replication run would change, as unified diffs.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Replicate(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
