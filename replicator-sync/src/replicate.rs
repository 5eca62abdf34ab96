//! Top-level replication run.
//!
//! 1. Snapshot source and destination.
//! 2. Pick one run timestamp for every record written.
//! 3. Walk the source hierarchy into the destination.
//! 4. Optionally sweep replicas missing from the source.
//! 5. Optionally sweep non-replicated destination assets.

use replicator_core::{AssetId, AssetStore, ProjectName, ReplicatorConfig};

use crate::classify::RunContext;
use crate::error::SyncError;
use crate::hierarchy::{create_hierarchy, HierarchyOutcome, WalkOptions};
use crate::metadata::RunTimestamp;
use crate::reconcile;
use crate::retry::RetryPolicy;

/// Run options. Both deletion sweeps are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicateOptions {
    pub delete_replicated_if_not_in_source: bool,
    pub delete_not_replicated_in_destination: bool,
    pub walk: WalkOptions,
}

impl From<&ReplicatorConfig> for ReplicateOptions {
    fn from(config: &ReplicatorConfig) -> Self {
        Self {
            delete_replicated_if_not_in_source: config.delete_replicated_if_not_in_source,
            delete_not_replicated_in_destination: config.delete_not_replicated_in_destination,
            walk: WalkOptions {
                batch_size: config.batch_size,
                retry: RetryPolicy::from(&config.retry),
            },
        }
    }
}

/// Summary of one run.
#[derive(Debug)]
pub struct ReplicationReport {
    pub source_project: ProjectName,
    pub destination_project: ProjectName,
    pub run_timestamp: RunTimestamp,
    pub source_count: usize,
    pub destination_count: usize,
    pub hierarchy: HierarchyOutcome,
    /// `None` when the sweep was not requested.
    pub deleted_not_in_source: Option<Vec<AssetId>>,
    /// `None` when the sweep was not requested.
    pub deleted_not_replicated: Option<Vec<AssetId>>,
}

/// Replicate every asset of `source` into `destination`, stamping records
/// with the current time.
pub fn replicate(
    source: &dyn AssetStore,
    destination: &dyn AssetStore,
    options: &ReplicateOptions,
) -> Result<ReplicationReport, SyncError> {
    replicate_at(source, destination, options, RunTimestamp::now())
}

/// [`replicate`] with an explicit run timestamp.
pub fn replicate_at(
    source: &dyn AssetStore,
    destination: &dyn AssetStore,
    options: &ReplicateOptions,
    run: RunTimestamp,
) -> Result<ReplicationReport, SyncError> {
    let project_src = source.project().clone();
    let project_dst = destination.project().clone();

    let assets_src = source.list_assets()?;
    let assets_dst = destination.list_assets()?;
    tracing::info!(
        "There are {} existing assets in source ({project_src}).",
        assets_src.len()
    );
    tracing::info!(
        "There are {} existing assets in destination ({project_dst}).",
        assets_dst.len()
    );
    tracing::info!("These copied/updated assets will have a replicated run time of: {run}.");

    tracing::info!(
        "Starting to copy and update {} assets from source ({project_src}) to destination ({project_dst}).",
        assets_src.len()
    );
    let ctx = RunContext {
        source_project: &project_src,
        run,
    };
    let hierarchy = create_hierarchy(&assets_src, &assets_dst, destination, ctx, &options.walk)?;
    tracing::info!(
        "Finished copying and updating {} assets from source ({project_src}) to destination ({project_dst}).",
        hierarchy.mapping.len()
    );
    if !hierarchy.failures.is_empty() {
        tracing::warn!(
            "{} assets could not be written to destination ({project_dst}).",
            hierarchy.failures.len()
        );
    }

    let deleted_not_in_source = if options.delete_replicated_if_not_in_source {
        let deleted = reconcile::remove_replicated_if_not_in_source(
            &assets_src,
            destination,
            &options.walk.retry,
        )?;
        tracing::info!(
            "Deleted {} assets in destination ({project_dst}) because they were no longer in source ({project_src}).",
            deleted.len()
        );
        Some(deleted)
    } else {
        None
    };

    let deleted_not_replicated = if options.delete_not_replicated_in_destination {
        let deleted =
            reconcile::remove_not_replicated_in_destination(destination, &options.walk.retry)?;
        tracing::info!(
            "Deleted {} assets in destination ({project_dst}) because they were not replicated from source ({project_src}).",
            deleted.len()
        );
        Some(deleted)
    } else {
        None
    };

    Ok(ReplicationReport {
        source_project: project_src,
        destination_project: project_dst,
        run_timestamp: run,
        source_count: assets_src.len(),
        destination_count: assets_dst.len(),
        hierarchy,
        deleted_not_in_source,
        deleted_not_replicated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicator_core::{Asset, MemoryStore};

    fn quick() -> ReplicateOptions {
        ReplicateOptions {
            walk: WalkOptions {
                batch_size: 10,
                retry: RetryPolicy::immediate(1),
            },
            ..ReplicateOptions::default()
        }
    }

    #[test]
    fn defaults_never_delete() {
        let options = ReplicateOptions::default();
        assert!(!options.delete_replicated_if_not_in_source);
        assert!(!options.delete_not_replicated_in_destination);
    }

    #[test]
    fn organic_assets_survive_default_run() {
        let source = MemoryStore::with_assets("src", vec![Asset::new(1, "site")]);
        let dest = MemoryStore::with_assets("dst", vec![Asset::new(1, "local")]);
        let report = replicate_at(&source, &dest, &quick(), RunTimestamp(1_000)).expect("run");
        assert!(report.deleted_not_in_source.is_none());
        assert!(report.deleted_not_replicated.is_none());
        assert_eq!(dest.snapshot().assets.len(), 2);
        assert_eq!(report.destination_count, 1);
        assert_eq!(report.source_project, ProjectName::from("src"));
    }

    #[test]
    fn options_from_config_copy_flags() {
        let mut config = ReplicatorConfig::new("a", "b");
        config.delete_not_replicated_in_destination = true;
        config.batch_size = 7;
        let options = ReplicateOptions::from(&config);
        assert!(options.delete_not_replicated_in_destination);
        assert!(!options.delete_replicated_if_not_in_source);
        assert_eq!(options.walk.batch_size, 7);
    }
}
