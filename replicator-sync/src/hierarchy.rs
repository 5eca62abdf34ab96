//! Breadth-first hierarchy walk.
//!
//! The source tree is processed one depth level at a time, starting at the
//! roots. A level is only built once every asset of the previous level has
//! been submitted and folded into the [`IdMapping`], so a child's parent
//! always has a destination id by the time the child's payload is built.
//!
//! Children of assets that ended the level without a mapping entry (their
//! create failed) are not attempted this run and are reported as skipped.

use std::collections::{HashMap, HashSet};

use replicator_core::{Asset, AssetId, AssetStore, DestId, IdMapping, SourceId, StoreError};

use crate::classify::{classify, Counterparts, PendingCreate, PendingUpdate, RunContext};
use crate::error::SyncError;
use crate::retry::{submit_batch, RetryPolicy};

/// Knobs for submitting each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            batch_size: replicator_core::config::DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Which write a failed asset was part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// A source asset the destination did not accept this run.
#[derive(Debug)]
pub struct FailedAsset {
    pub source: SourceId,
    pub depth: usize,
    pub operation: Operation,
    pub error: StoreError,
}

/// Counts for one depth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelReport {
    pub depth: usize,
    pub assets: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Result of a full walk.
#[derive(Debug, Default)]
pub struct HierarchyOutcome {
    pub mapping: IdMapping,
    pub levels: Vec<LevelReport>,
    pub failures: Vec<FailedAsset>,
    /// Source assets never reached: descendants of failed creates, and
    /// assets whose parent is missing from the source.
    pub skipped: Vec<SourceId>,
}

impl HierarchyOutcome {
    pub fn created(&self) -> usize {
        self.levels.iter().map(|l| l.created).sum()
    }

    pub fn updated(&self) -> usize {
        self.levels.iter().map(|l| l.updated).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.levels.iter().map(|l| l.unchanged).sum()
    }
}

/// Mapping entries for every source asset that already has a replica.
pub fn seed_mapping(source: &[Asset], counterparts: &Counterparts) -> IdMapping {
    let mut mapping = IdMapping::new();
    for asset in source {
        if let Some(existing) = counterparts.find(asset) {
            mapping.insert(SourceId(asset.id), DestId(existing.id));
        }
    }
    mapping
}

/// Create or update the whole source hierarchy in `destination`.
///
/// `destination_assets` is the destination snapshot taken at run start; it
/// is only used to find existing replicas.
pub fn create_hierarchy(
    source_assets: &[Asset],
    destination_assets: &[Asset],
    destination: &dyn AssetStore,
    ctx: RunContext<'_>,
    options: &WalkOptions,
) -> Result<HierarchyOutcome, SyncError> {
    let counterparts = Counterparts::resolve(source_assets, destination_assets);
    let mut outcome = HierarchyOutcome {
        mapping: seed_mapping(source_assets, &counterparts),
        ..HierarchyOutcome::default()
    };
    tracing::debug!(
        "seeded mapping with {} existing replicas",
        outcome.mapping.len()
    );

    let children = index_children(source_assets);
    let mut visited: HashSet<AssetId> = HashSet::new();
    let mut level = take_unvisited(children.get(&None), &mut visited);
    let mut depth = 0;

    while !level.is_empty() {
        tracing::info!("Starting depth {depth}, with {} assets.", level.len());
        let classified = classify(&level, &counterparts, &outcome.mapping, ctx, depth)?;
        let mut report = LevelReport {
            depth,
            assets: level.len(),
            unchanged: classified.unchanged.len(),
            ..LevelReport::default()
        };

        // Updates go first so an external id released by one can be taken by a
        // create in the same level.
        tracing::info!("Attempting to update {} assets.", classified.to_update.len());
        let updated = submit_batch(
            "update assets",
            classified.to_update,
            options.batch_size,
            &options.retry,
            |chunk: &[PendingUpdate]| {
                let payloads: Vec<_> = chunk.iter().map(|p| p.payload.clone()).collect();
                destination.update(&payloads)
            },
        );

        tracing::info!("Attempting to create {} assets.", classified.to_create.len());
        let created = submit_batch(
            "create assets",
            classified.to_create,
            options.batch_size,
            &options.retry,
            |chunk: &[PendingCreate]| {
                let payloads: Vec<_> = chunk.iter().map(|p| p.payload.clone()).collect();
                destination.create(&payloads)
            },
        );

        for (pending, asset) in &created.succeeded {
            outcome.mapping.insert(pending.source, DestId(asset.id));
        }
        for (pending, asset) in &updated.succeeded {
            outcome.mapping.insert(pending.source, DestId(asset.id));
        }
        for unchanged in &classified.unchanged {
            outcome
                .mapping
                .insert(unchanged.source, DestId(unchanged.existing.id));
        }
        tracing::debug!("current asset mapping has {} entries", outcome.mapping.len());

        report.created = created.succeeded.len();
        report.updated = updated.succeeded.len();
        for failure in created.failures {
            outcome.failures.push(FailedAsset {
                source: failure.item.source,
                depth,
                operation: Operation::Create,
                error: failure.error,
            });
            report.failed += 1;
        }
        for failure in updated.failures {
            outcome.failures.push(FailedAsset {
                source: failure.item.source,
                depth,
                operation: Operation::Update,
                error: failure.error,
            });
            report.failed += 1;
        }

        tracing::info!(
            "Finished depth {depth}, updated {} and posted {} assets (total of {} assets).",
            report.updated,
            report.created,
            report.updated + report.created
        );
        outcome.levels.push(report);

        // Only assets with a destination id can parent the next level.
        let mut next = Vec::new();
        for asset in &level {
            if outcome.mapping.contains(SourceId(asset.id)) {
                next.extend(take_unvisited(children.get(&Some(asset.id)), &mut visited));
            }
        }
        level = next;
        depth += 1;
    }

    outcome.skipped = source_assets
        .iter()
        .filter(|a| !visited.contains(&a.id))
        .map(|a| SourceId(a.id))
        .collect();
    if !outcome.skipped.is_empty() {
        tracing::warn!(
            "{} source assets were not reached this run (failed or missing parent).",
            outcome.skipped.len()
        );
    }
    Ok(outcome)
}

/// Children of every source asset, keyed by parent, in source order.
fn index_children(assets: &[Asset]) -> HashMap<Option<AssetId>, Vec<&Asset>> {
    let mut children: HashMap<Option<AssetId>, Vec<&Asset>> = HashMap::new();
    for asset in assets {
        children.entry(asset.parent_id).or_default().push(asset);
    }
    children
}

fn take_unvisited<'a>(
    candidates: Option<&Vec<&'a Asset>>,
    visited: &mut HashSet<AssetId>,
) -> Vec<&'a Asset> {
    candidates
        .into_iter()
        .flatten()
        .copied()
        .filter(|asset| visited.insert(asset.id))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
