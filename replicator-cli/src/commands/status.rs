//! `replicator status`: what each configured project currently holds.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use replicator_core::{Asset, AssetId, AssetStore};
use replicator_sync::{
    metadata::{self, REPLICATED_TIME},
    pipeline, RunTimestamp,
};

use super::ConfigArgs;

/// Arguments for `replicator status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = self.config.load()?;
        let (source, destination) = pipeline::catalog_stores(&home, &config);

        let rows = vec![
            project_status("source", &source)?,
            project_status("destination", &destination)?,
        ];
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ProjectStatus {
    role: &'static str,
    project: String,
    assets: usize,
    replicated: usize,
    organic: usize,
    roots: usize,
    max_depth: Option<usize>,
    last_replicated_at: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "project")]
    project: String,
    #[tabled(rename = "assets")]
    assets: usize,
    #[tabled(rename = "replicated")]
    replicated: usize,
    #[tabled(rename = "organic")]
    organic: usize,
    #[tabled(rename = "roots")]
    roots: usize,
    #[tabled(rename = "depth")]
    depth: String,
    #[tabled(rename = "last replicated")]
    last_replicated: String,
}

fn project_status(role: &'static str, store: &dyn AssetStore) -> Result<ProjectStatus> {
    let assets = store
        .list_assets()
        .with_context(|| format!("failed to list assets of '{}'", store.project()))?;
    let replicated = assets.iter().filter(|a| metadata::is_replicated(a)).count();
    Ok(ProjectStatus {
        role,
        project: store.project().to_string(),
        assets: assets.len(),
        replicated,
        organic: assets.len() - replicated,
        roots: assets.iter().filter(|a| a.is_root()).count(),
        max_depth: max_depth(&assets),
        last_replicated_at: last_replicated_at(&assets),
    })
}

/// Depth of the deepest asset reachable from a root; `None` when empty.
fn max_depth(assets: &[Asset]) -> Option<usize> {
    let mut children: HashMap<Option<AssetId>, Vec<AssetId>> = HashMap::new();
    for asset in assets {
        children.entry(asset.parent_id).or_default().push(asset.id);
    }

    let mut seen = HashSet::new();
    let mut level: Vec<AssetId> = children.get(&None).cloned().unwrap_or_default();
    let mut depth = None;
    while !level.is_empty() {
        depth = Some(depth.map_or(0, |d| d + 1));
        level = level
            .into_iter()
            .filter(|id| seen.insert(*id))
            .flat_map(|id| children.get(&Some(id)).cloned().unwrap_or_default())
            .collect();
    }
    depth
}

fn last_replicated_at(assets: &[Asset]) -> Option<DateTime<Utc>> {
    assets
        .iter()
        .filter_map(|a| a.metadata.get(REPLICATED_TIME))
        .filter_map(|raw| raw.trim().parse::<i64>().ok())
        .max()
        .and_then(|ms| RunTimestamp(ms).as_datetime())
}

fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn print_table(rows: Vec<ProjectStatus>) {
    println!("Replicator v{}", env!("CARGO_PKG_VERSION"));
    let stale_hint = rows
        .iter()
        .any(|r| r.role == "destination" && r.replicated == 0);

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            role: row.role.bold().to_string(),
            project: row.project,
            assets: row.assets,
            replicated: row.replicated,
            organic: row.organic,
            roots: row.roots,
            depth: row
                .max_depth
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
            last_replicated: row
                .last_replicated_at
                .map_or_else(|| "never".bright_black().to_string(), format_age),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if stale_hint {
        println!("Nothing replicated yet. Run 'replicator replicate' to copy the source.");
    }
}
