//! `replicator diff`: show what a replication run would change.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use replicator_sync::pipeline;

use super::ConfigArgs;

/// Arguments for `replicator diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let (home, config) = self.config.load()?;
        let plan = pipeline::plan(&home, &config).with_context(|| {
            format!(
                "diff failed for '{}' → '{}'",
                config.source.project, config.destination.project
            )
        })?;

        if plan.to_create.is_empty() && plan.to_update.is_empty() {
            println!(
                "No differences between '{}' and '{}'.",
                config.source.project, config.destination.project
            );
            return Ok(());
        }

        println!(
            "{} to create, {} to update, {} unchanged",
            plan.to_create.len(),
            plan.to_update.len(),
            plan.unchanged
        );
        for source in &plan.to_create {
            println!("{}", format!("+ new replica of {source}").green());
        }
        for diff in plan.to_update {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
