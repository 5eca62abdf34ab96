//! Deletion sweeps over the destination.
//!
//! Both sweeps list the destination fresh, decide, then issue a single bulk
//! delete. They are independent and can run in either order.

use std::collections::HashSet;

use replicator_core::{Asset, AssetId, AssetStore, SourceId};

use crate::error::SyncError;
use crate::metadata;
use crate::retry::{retry, RetryPolicy};

/// Replicas whose source asset is gone.
///
/// Assets without a readable `_replicatedInternalId` are left alone.
pub fn replicated_not_in_source(
    destination: &[Asset],
    source_ids: &HashSet<SourceId>,
) -> Vec<AssetId> {
    destination
        .iter()
        .filter(|asset| metadata::is_replicated(asset))
        .filter(|asset| {
            metadata::replicated_internal_id(asset).is_some_and(|id| !source_ids.contains(&id))
        })
        .map(|asset| asset.id)
        .collect()
}

/// Destination assets with no replication tag at all.
pub fn not_replicated(destination: &[Asset]) -> Vec<AssetId> {
    destination
        .iter()
        .filter(|asset| !metadata::is_replicated(asset))
        .map(|asset| asset.id)
        .collect()
}

/// Sweep A: delete replicas whose source asset no longer exists.
///
/// Returns every destination id removed, descendants included.
pub fn remove_replicated_if_not_in_source(
    source_assets: &[Asset],
    destination: &dyn AssetStore,
    policy: &RetryPolicy,
) -> Result<Vec<AssetId>, SyncError> {
    let source_ids: HashSet<SourceId> = source_assets.iter().map(|a| SourceId(a.id)).collect();
    let current = destination.list_assets()?;
    let doomed = replicated_not_in_source(&current, &source_ids);
    delete_all("delete replicas missing from source", destination, &current, &doomed, policy)
}

/// Sweep B: delete every destination asset that was not replicated.
///
/// Indiscriminate; meant for destinations wholly owned by the replicator.
/// Returns every destination id removed, descendants included.
pub fn remove_not_replicated_in_destination(
    destination: &dyn AssetStore,
    policy: &RetryPolicy,
) -> Result<Vec<AssetId>, SyncError> {
    let current = destination.list_assets()?;
    let doomed = not_replicated(&current);
    delete_all("delete non-replicated assets", destination, &current, &doomed, policy)
}

/// Deletes `ids` and reports what actually disappeared from `before`.
///
/// Deletes cascade, so the result can be larger than `ids`.
fn delete_all(
    what: &str,
    destination: &dyn AssetStore,
    before: &[Asset],
    ids: &[AssetId],
    policy: &RetryPolicy,
) -> Result<Vec<AssetId>, SyncError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    tracing::debug!("{what}: {} ids", ids.len());
    retry(what, policy, || destination.delete(ids))?;

    let remaining: HashSet<AssetId> = destination.list_assets()?.iter().map(|a| a.id).collect();
    let removed: Vec<AssetId> = before
        .iter()
        .map(|a| a.id)
        .filter(|id| !remaining.contains(id))
        .collect();
    if removed.len() > ids.len() {
        tracing::debug!(
            "{what}: {} descendants removed along with them",
            removed.len() - ids.len()
        );
    }
    Ok(removed)
}
