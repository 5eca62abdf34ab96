pub mod diff;
pub mod replicate;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use replicator_core::{config, ReplicatorConfig};

/// `--config` flag shared by every subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the config file [default: ~/.replicator/replicator.yaml].
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Home directory and the loaded, validated config.
    pub fn load(&self) -> Result<(PathBuf, ReplicatorConfig)> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| config::config_path_at(&home));
        tracing::debug!("loading config from {}", path.display());
        let config = config::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok((home, config))
    }
}
