//! `replicator replicate`: run one replication.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use replicator_core::AssetId;
use replicator_sync::{
    hierarchy::Operation, pipeline, LevelReport, ReplicateOptions, ReplicationReport,
};

use super::ConfigArgs;

/// Arguments for `replicator replicate`.
#[derive(Args, Debug)]
pub struct ReplicateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Report what would change without writing to the destination.
    #[arg(long)]
    pub dry_run: bool,

    /// Also delete replicas whose source asset no longer exists.
    #[arg(long)]
    pub delete_replicated_if_not_in_source: bool,

    /// Also delete every destination asset that was not replicated.
    #[arg(long)]
    pub delete_not_replicated_in_destination: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReplicateArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = self.config.load()?;

        let mut options = ReplicateOptions::from(&config);
        options.delete_replicated_if_not_in_source |= self.delete_replicated_if_not_in_source;
        options.delete_not_replicated_in_destination |= self.delete_not_replicated_in_destination;
        tracing::debug!(
            "replicating '{}' -> '{}' (dry_run={}, batch_size={})",
            config.source.project,
            config.destination.project,
            self.dry_run,
            options.walk.batch_size
        );

        let report = pipeline::run(&home, &config, &options, self.dry_run).with_context(|| {
            format!(
                "replication from '{}' to '{}' failed",
                config.source.project, config.destination.project
            )
        })?;

        let failed = report.hierarchy.failures.len();
        if self.json {
            print_json(&report, self.dry_run)?;
        } else {
            print_summary(&report, self.dry_run);
        }

        if failed > 0 {
            bail!("{failed} assets could not be replicated");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReportJson {
    source: String,
    destination: String,
    dry_run: bool,
    run_timestamp: i64,
    run_time: Option<String>,
    source_assets: usize,
    destination_assets: usize,
    created: usize,
    updated: usize,
    unchanged: usize,
    levels: Vec<LevelJson>,
    failures: Vec<FailureJson>,
    skipped: Vec<i64>,
    deleted_not_in_source: Option<Vec<i64>>,
    deleted_not_replicated: Option<Vec<i64>>,
}

#[derive(Serialize)]
struct LevelJson {
    depth: usize,
    assets: usize,
    created: usize,
    updated: usize,
    unchanged: usize,
    failed: usize,
}

#[derive(Serialize)]
struct FailureJson {
    source_id: i64,
    depth: usize,
    operation: &'static str,
    error: String,
}

fn raw_ids(ids: &Option<Vec<AssetId>>) -> Option<Vec<i64>> {
    ids.as_ref().map(|ids| ids.iter().map(|id| id.0).collect())
}

fn print_json(report: &ReplicationReport, dry_run: bool) -> Result<()> {
    let outcome = &report.hierarchy;
    let payload = ReportJson {
        source: report.source_project.to_string(),
        destination: report.destination_project.to_string(),
        dry_run,
        run_timestamp: report.run_timestamp.0,
        run_time: report.run_timestamp.as_datetime().map(|t| t.to_rfc3339()),
        source_assets: report.source_count,
        destination_assets: report.destination_count,
        created: outcome.created(),
        updated: outcome.updated(),
        unchanged: outcome.unchanged(),
        levels: outcome
            .levels
            .iter()
            .map(|l| LevelJson {
                depth: l.depth,
                assets: l.assets,
                created: l.created,
                updated: l.updated,
                unchanged: l.unchanged,
                failed: l.failed,
            })
            .collect(),
        failures: outcome
            .failures
            .iter()
            .map(|f| FailureJson {
                source_id: f.source.0 .0,
                depth: f.depth,
                operation: operation_key(f.operation),
                error: f.error.to_string(),
            })
            .collect(),
        skipped: outcome.skipped.iter().map(|s| s.0 .0).collect(),
        deleted_not_in_source: raw_ids(&report.deleted_not_in_source),
        deleted_not_replicated: raw_ids(&report.deleted_not_replicated),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize report JSON")?
    );
    Ok(())
}

fn operation_key(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "create",
        Operation::Update => "update",
    }
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct LevelRow {
    #[tabled(rename = "depth")]
    depth: usize,
    #[tabled(rename = "assets")]
    assets: usize,
    #[tabled(rename = "created")]
    created: usize,
    #[tabled(rename = "updated")]
    updated: usize,
    #[tabled(rename = "unchanged")]
    unchanged: usize,
    #[tabled(rename = "failed")]
    failed: usize,
}

impl From<&LevelReport> for LevelRow {
    fn from(l: &LevelReport) -> Self {
        Self {
            depth: l.depth,
            assets: l.assets,
            created: l.created,
            updated: l.updated,
            unchanged: l.unchanged,
            failed: l.failed,
        }
    }
}

fn print_summary(report: &ReplicationReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let outcome = &report.hierarchy;
    let mark = if outcome.failures.is_empty() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };

    println!(
        "{prefix}{mark} '{}' → '{}' ({} created, {} updated, {} unchanged)",
        report.source_project,
        report.destination_project,
        outcome.created(),
        outcome.updated(),
        outcome.unchanged(),
    );

    if !outcome.levels.is_empty() {
        let rows: Vec<LevelRow> = outcome.levels.iter().map(LevelRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for failure in &outcome.failures {
        println!(
            "  {}  {} at depth {} ({}): {}",
            "✗".red(),
            failure.source,
            failure.depth,
            operation_key(failure.operation),
            failure.error
        );
    }
    if !outcome.skipped.is_empty() {
        println!(
            "  {}  {} assets not reached this run",
            "·".bright_black(),
            outcome.skipped.len()
        );
    }
    if let Some(deleted) = &report.deleted_not_in_source {
        println!(
            "{prefix}deleted {} replicas no longer in source",
            deleted.len()
        );
    }
    if let Some(deleted) = &report.deleted_not_replicated {
        println!(
            "{prefix}deleted {} non-replicated destination assets",
            deleted.len()
        );
    }
}
