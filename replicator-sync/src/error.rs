//! Error types for replicator-sync.

use thiserror::Error;

use replicator_core::{ConfigError, SourceId, StoreError};

/// All errors that abort a replication run.
///
/// Per-item store failures are not errors at this level; they are collected
/// in the run report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A store call failed outside of the batched, per-item paths
    /// (snapshot listing, deletion sweeps).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A child was about to be created before its parent had a destination
    /// id. The hierarchy walk is out of order.
    #[error("asset {asset} at depth {depth} has no destination id for parent {parent}")]
    MissingParent {
        asset: SourceId,
        parent: SourceId,
        depth: usize,
    },

    /// An error from the config layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
