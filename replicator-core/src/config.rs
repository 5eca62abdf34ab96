//! Replicator configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.replicator/
//!   replicator.yaml       (run configuration)
//!   catalogs/             (default catalog root)
//!     <project>.json
//! ```
//!
//! # API pattern
//!
//! Every path-resolving function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ProjectName;

/// Default number of assets per create/update call.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// One side of a replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectName,
}

/// Backoff settings for retried store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Full run configuration, as read from `replicator.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    pub source: ProjectConfig,
    pub destination: ProjectConfig,
    /// Directory holding `<project>.json` catalogs. Defaults to
    /// `<home>/.replicator/catalogs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_root: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub delete_replicated_if_not_in_source: bool,
    #[serde(default)]
    pub delete_not_replicated_in_destination: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl ReplicatorConfig {
    /// Config for `source` → `destination` with every option at its default.
    pub fn new(source: impl Into<ProjectName>, destination: impl Into<ProjectName>) -> Self {
        Self {
            source: ProjectConfig {
                project: source.into(),
            },
            destination: ProjectConfig {
                project: destination.into(),
            },
            catalog_root: None,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
            delete_replicated_if_not_in_source: false,
            delete_not_replicated_in_destination: false,
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.project.0.trim().is_empty() || self.destination.project.0.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "source and destination projects must be named".to_string(),
            ));
        }
        for project in [&self.source.project, &self.destination.project] {
            if !is_file_safe(&project.0) {
                return Err(ConfigError::Invalid(format!(
                    "project name '{project}' cannot be used as a catalog file name"
                )));
            }
        }
        if self.source.project == self.destination.project {
            return Err(ConfigError::Invalid(format!(
                "source and destination are both '{}'",
                self.source.project
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.base_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.max_backoff_ms must not be below retry.base_backoff_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// The catalog root, falling back to `<home>/.replicator/catalogs`.
    pub fn catalog_root_at(&self, home: &Path) -> PathBuf {
        self.catalog_root
            .clone()
            .unwrap_or_else(|| default_catalog_root_at(home))
    }
}

/// Project names become file names under the catalog root and must stay there.
fn is_file_safe(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.replicator/replicator.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".replicator").join("replicator.yaml")
}

/// `<home>/.replicator/catalogs`: pure, no I/O.
pub fn default_catalog_root_at(home: &Path) -> PathBuf {
    home.join(".replicator").join("catalogs")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load and validate the config file at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<ReplicatorConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ReplicatorConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

/// Load `<home>/.replicator/replicator.yaml`.
pub fn load_at(home: &Path) -> Result<ReplicatorConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ReplicatorConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save `config` to `path` (`.yaml.tmp` sibling, then rename).
pub fn save_to(path: &Path, config: &ReplicatorConfig) -> Result<(), ConfigError> {
    let io = |p: &Path, source| ConfigError::Io {
        path: p.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io(path, e))?;
    Ok(())
}

/// Home directory, or `ConfigError::HomeNotFound`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_path_is_correct() {
        let home = TempDir::new().expect("tempdir");
        assert!(config_path_at(home.path()).ends_with(".replicator/replicator.yaml"));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "source: { project: publicdata }\ndestination: { project: sandbox }\n";
        let config: ReplicatorConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.retry, RetryConfig::default());
        assert!(!config.delete_replicated_if_not_in_source);
        assert!(!config.delete_not_replicated_in_destination);
        config.validate().expect("valid");
    }

    #[test]
    fn same_source_and_destination_is_invalid() {
        let config = ReplicatorConfig::new("publicdata", "publicdata");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let mut config = ReplicatorConfig::new("a", "b");
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn catalog_root_defaults_under_home() {
        let home = TempDir::new().expect("tempdir");
        let config = ReplicatorConfig::new("a", "b");
        assert_eq!(
            config.catalog_root_at(home.path()),
            home.path().join(".replicator").join("catalogs")
        );
    }
}
