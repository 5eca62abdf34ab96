//! Error types for replicator-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::AssetId;

/// Retry policy class for store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
}

/// All errors that can arise from asset store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog file could not be (de)serialized.
    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network hiccup, rate limit, or any other failure worth retrying.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Another asset in the project already uses this external id.
    #[error("external id '{external_id}' already exists")]
    DuplicateExternalId { external_id: String },

    /// A create payload references a parent that does not exist.
    #[error("parent asset {parent} does not exist")]
    UnknownParent { parent: AssetId },

    /// An update targets an asset that does not exist.
    #[error("asset {id} does not exist")]
    UnknownAsset { id: AssetId },

    /// The store refused the request for any other reason.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Transient(_) => RetryClass::Retryable,
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Json(_)
            | Self::DuplicateExternalId { .. }
            | Self::UnknownParent { .. }
            | Self::UnknownAsset { .. }
            | Self::Rejected(_) => RetryClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_class() == RetryClass::Retryable
    }
}

/// Errors raised while loading or validating replicator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// Parsed fine, but the values do not make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
