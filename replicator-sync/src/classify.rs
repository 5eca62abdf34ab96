//! Create / update / unchanged decision for one depth level.
//!
//! Equality covers `external_id`, `name`, `description`, `source` and the
//! metadata the replica is expected to carry, minus `_replicatedTime`. The
//! run timestamp alone never forces a write, so a re-run against an
//! unchanged source writes nothing.

use std::collections::{HashMap, HashSet};

use replicator_core::{
    Asset, AssetId, AssetUpdate, DestId, IdMapping, Metadata, NewAsset, ProjectName, SourceId,
};

use crate::error::SyncError;
use crate::metadata::{self, RunTimestamp, REPLICATED_TIME};

/// Source project and run timestamp shared by every payload of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub source_project: &'a ProjectName,
    pub run: RunTimestamp,
}

// ---------------------------------------------------------------------------
// Counterpart lookup
// ---------------------------------------------------------------------------

/// One-to-one pairing of source assets with their destination replicas.
#[derive(Debug, Default)]
pub struct Counterparts {
    by_source: HashMap<SourceId, Asset>,
}

impl Counterparts {
    /// Pair every source asset with at most one replicated destination asset,
    /// and every replica with at most one source asset.
    ///
    /// A replica whose `_replicatedInternalId` names a source asset is claimed
    /// by that asset. A source asset left unmatched may then claim a replica
    /// with the same external id, but only if that replica's recorded source
    /// id is missing, unreadable or no longer in `source`. Organic assets are
    /// never matched. When two replicas record the same source id, the first
    /// in store order wins.
    pub fn resolve(source: &[Asset], destination: &[Asset]) -> Self {
        let source_ids: HashSet<SourceId> = source.iter().map(|a| SourceId(a.id)).collect();

        let mut by_recorded_id: HashMap<SourceId, &Asset> = HashMap::new();
        let mut by_external_id: HashMap<&str, &Asset> = HashMap::new();
        for replica in destination.iter().filter(|a| metadata::is_replicated(a)) {
            if let Some(recorded) = metadata::replicated_internal_id(replica) {
                by_recorded_id.entry(recorded).or_insert(replica);
            }
            if let Some(xid) = replica.external_id.as_deref() {
                by_external_id.entry(xid).or_insert(replica);
            }
        }

        let mut out = Self::default();
        let mut claimed: HashSet<AssetId> = HashSet::new();
        for asset in source {
            let id = SourceId(asset.id);
            if let Some(replica) = by_recorded_id.get(&id) {
                if claimed.insert(replica.id) {
                    out.by_source.insert(id, (*replica).clone());
                }
            }
        }

        for asset in source {
            let id = SourceId(asset.id);
            if out.by_source.contains_key(&id) {
                continue;
            }
            let Some(replica) = asset
                .external_id
                .as_deref()
                .and_then(|xid| by_external_id.get(xid))
            else {
                continue;
            };
            let owner_gone = metadata::replicated_internal_id(replica)
                .map_or(true, |recorded| !source_ids.contains(&recorded));
            if owner_gone && claimed.insert(replica.id) {
                tracing::debug!(
                    "source asset {} adopts replica {} by external id",
                    asset.id,
                    replica.id
                );
                out.by_source.insert(id, (*replica).clone());
            }
        }
        out
    }

    /// Destination replica paired with `source`, if any.
    pub fn find(&self, source: &Asset) -> Option<&Asset> {
        self.by_source.get(&SourceId(source.id))
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A create payload and the source asset it replicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCreate {
    pub source: SourceId,
    pub payload: NewAsset,
}

/// An update payload and the source asset it replicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub source: SourceId,
    pub payload: AssetUpdate,
}

/// A destination replica that already matches its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unchanged {
    pub source: SourceId,
    pub existing: Asset,
}

/// One depth level split three ways. The lists are disjoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Classified {
    pub to_create: Vec<PendingCreate>,
    pub to_update: Vec<PendingUpdate>,
    pub unchanged: Vec<Unchanged>,
}

impl Classified {
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create payload for `source`, with its parent resolved through `mapping`.
///
/// Errors with [`SyncError::MissingParent`] if the source parent has no
/// destination id yet; such an asset must never be created as a root.
pub fn build_create(
    source: &Asset,
    mapping: &IdMapping,
    ctx: RunContext<'_>,
    depth: usize,
) -> Result<NewAsset, SyncError> {
    let parent_id = match source.parent_id {
        None => None,
        Some(parent) => {
            let parent = SourceId(parent);
            let DestId(dest) = mapping.get(parent).ok_or(SyncError::MissingParent {
                asset: SourceId(source.id),
                parent,
                depth,
            })?;
            Some(dest)
        }
    };

    tracing::debug!("building create for source asset {}", source.id);
    Ok(NewAsset {
        external_id: source.external_id.clone(),
        name: source.name.clone(),
        description: source.description.clone(),
        metadata: metadata::tag(source, ctx.source_project, ctx.run),
        source: source.source.clone(),
        parent_id,
    })
}

/// Update payload bringing `existing` in line with `source`.
///
/// The parent is not part of the payload: re-parenting replicas is not
/// supported.
pub fn build_update(source: &Asset, existing: &Asset, ctx: RunContext<'_>) -> AssetUpdate {
    tracing::debug!(
        "building update for destination asset {} from source asset {}",
        existing.id,
        source.id
    );
    AssetUpdate {
        id: existing.id,
        external_id: source.external_id.clone(),
        name: source.name.clone(),
        description: source.description.clone(),
        source: source.source.clone(),
        metadata: metadata::tag(source, ctx.source_project, ctx.run),
    }
}

/// `true` when any replicable field of `existing` differs from what
/// replicating `source` would write.
pub fn needs_update(source: &Asset, existing: &Asset, ctx: RunContext<'_>) -> bool {
    source.external_id != existing.external_id
        || source.name != existing.name
        || source.description != existing.description
        || source.source != existing.source
        || without_time(&metadata::tag(source, ctx.source_project, ctx.run))
            != without_time(&existing.metadata)
}

fn without_time(metadata: &Metadata) -> Metadata {
    let mut out = metadata.clone();
    out.remove(REPLICATED_TIME);
    out
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Split the source assets of one depth level into create / update /
/// unchanged against their destination counterparts.
pub fn classify(
    batch: &[&Asset],
    counterparts: &Counterparts,
    mapping: &IdMapping,
    ctx: RunContext<'_>,
    depth: usize,
) -> Result<Classified, SyncError> {
    let mut out = Classified::default();
    for source in batch {
        let source_id = SourceId(source.id);
        match counterparts.find(source) {
            None => out.to_create.push(PendingCreate {
                source: source_id,
                payload: build_create(source, mapping, ctx, depth)?,
            }),
            Some(existing) if needs_update(source, existing, ctx) => {
                out.to_update.push(PendingUpdate {
                    source: source_id,
                    payload: build_update(source, existing, ctx),
                })
            }
            Some(existing) => out.unchanged.push(Unchanged {
                source: source_id,
                existing: existing.clone(),
            }),
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{REPLICATED_INTERNAL_ID, REPLICATED_SOURCE};
    use rstest::rstest;

    fn project() -> ProjectName {
        ProjectName::from("publicdata")
    }

    fn ctx(project: &ProjectName, run: i64) -> RunContext<'_> {
        RunContext {
            source_project: project,
            run: RunTimestamp(run),
        }
    }

    fn source() -> Asset {
        let mut asset = Asset::new(10, "pump")
            .with_external_id("P-10")
            .with_metadata("vendor", "acme")
            .with_parent(1);
        asset.description = Some("feed pump".to_string());
        asset.source = Some("sap".to_string());
        asset
    }

    /// Destination replica of `source()` written at run 100.
    fn replica(project: &ProjectName) -> Asset {
        let src = source();
        Asset {
            id: AssetId(510),
            external_id: src.external_id.clone(),
            name: src.name.clone(),
            description: src.description.clone(),
            source: src.source.clone(),
            metadata: metadata::tag(&src, project, RunTimestamp(100)),
            parent_id: Some(AssetId(501)),
        }
    }

    #[test]
    fn identical_fields_with_new_timestamp_are_unchanged() {
        let p = project();
        assert!(!needs_update(&source(), &replica(&p), ctx(&p, 999)));
    }

    #[rstest]
    #[case("external_id", |a: &mut Asset| a.external_id = Some("P-11".to_string()))]
    #[case("name", |a: &mut Asset| a.name = "pump B".to_string())]
    #[case("description", |a: &mut Asset| a.description = None)]
    #[case("source", |a: &mut Asset| a.source = Some("maximo".to_string()))]
    #[case("metadata", |a: &mut Asset| { a.metadata.insert("vendor".into(), "other".into()); })]
    fn any_single_field_change_triggers_update(
        #[case] label: &str,
        #[case] edit: fn(&mut Asset),
    ) {
        let p = project();
        let mut changed = source();
        edit(&mut changed);
        assert!(
            needs_update(&changed, &replica(&p), ctx(&p, 100)),
            "[{label}] change must trigger update"
        );
    }

    #[test]
    fn build_update_keeps_destination_identity() {
        let p = project();
        let existing = replica(&p);
        let mut src = source();
        src.name = "renamed".to_string();
        let update = build_update(&src, &existing, ctx(&p, 200));
        assert_eq!(update.id, existing.id);
        assert_eq!(update.name, "renamed");
        assert_eq!(
            update.metadata.get(REPLICATED_TIME).map(String::as_str),
            Some("200")
        );
        assert_eq!(existing.name, "pump", "existing must not be mutated");
    }

    #[test]
    fn build_create_resolves_parent_through_mapping() {
        let p = project();
        let mut mapping = IdMapping::new();
        mapping.insert(SourceId(AssetId(1)), DestId(AssetId(501)));
        let payload = build_create(&source(), &mapping, ctx(&p, 1), 1).expect("create");
        assert_eq!(payload.parent_id, Some(AssetId(501)));
        assert_eq!(payload.external_id.as_deref(), Some("P-10"));
        assert_eq!(
            payload.metadata.get(REPLICATED_INTERNAL_ID).map(String::as_str),
            Some("10")
        );
    }

    #[test]
    fn build_create_for_root_has_no_parent() {
        let p = project();
        let root = Asset::new(1, "site");
        let payload = build_create(&root, &IdMapping::new(), ctx(&p, 1), 0).expect("create");
        assert_eq!(payload.parent_id, None);
    }

    #[test]
    fn build_create_without_parent_mapping_is_fatal() {
        let p = project();
        let err = build_create(&source(), &IdMapping::new(), ctx(&p, 1), 1).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingParent { asset, parent, depth: 1 }
                if asset == SourceId(AssetId(10)) && parent == SourceId(AssetId(1))
        ));
    }

    #[test]
    fn classify_splits_batch_three_ways() {
        let p = project();
        let unchanged_src = source();
        let mut changed_src = Asset::new(11, "valve").with_parent(1);
        let new_src = Asset::new(12, "motor").with_parent(1);

        let mut changed_dst = Asset::new(511, "valve").with_parent(501);
        changed_dst.metadata = metadata::tag(&changed_src, &p, RunTimestamp(100));
        changed_src.name = "valve v2".to_string();

        let sources = [unchanged_src.clone(), changed_src.clone(), new_src.clone()];
        let counterparts = Counterparts::resolve(&sources, &[replica(&p), changed_dst]);
        let mut mapping = IdMapping::new();
        mapping.insert(SourceId(AssetId(1)), DestId(AssetId(501)));

        let batch = [&unchanged_src, &changed_src, &new_src];
        let classified = classify(&batch, &counterparts, &mapping, ctx(&p, 300), 1)
            .expect("classify");

        assert_eq!(classified.unchanged.len(), 1);
        assert_eq!(classified.unchanged[0].existing.id, AssetId(510));
        assert_eq!(classified.to_update.len(), 1);
        assert_eq!(classified.to_update[0].payload.id, AssetId(511));
        assert_eq!(classified.to_create.len(), 1);
        assert_eq!(classified.to_create[0].source, SourceId(AssetId(12)));
        assert_eq!(classified.len(), 3);
    }

    #[test]
    fn organic_assets_are_never_counterparts() {
        let organic = Asset::new(900, "pump").with_external_id("P-10");
        let counterparts = Counterparts::resolve(&[source()], &[organic]);
        assert!(counterparts.find(&source()).is_none());
        assert!(counterparts.is_empty());
    }

    #[test]
    fn replica_found_by_external_id_when_source_id_changed() {
        let p = project();
        let stale = replica(&p).with_metadata(REPLICATED_INTERNAL_ID, "4242");
        let counterparts = Counterparts::resolve(&[source()], &[stale]);
        let found = counterparts.find(&source()).expect("match by external id");
        assert_eq!(found.id, AssetId(510));
        assert!(
            needs_update(&source(), found, ctx(&p, 100)),
            "stale source id tag must be rewritten"
        );
    }

    #[test]
    fn replica_of_live_source_is_not_adopted_by_external_id() {
        let p = project();
        // Replica 510 records source 10, which moved to external id P-99;
        // source 20 now carries P-10.
        let mut moved = source();
        moved.external_id = Some("P-99".to_string());
        let newcomer = Asset::new(20, "new pump").with_external_id("P-10");

        let counterparts = Counterparts::resolve(&[moved.clone(), newcomer.clone()], &[replica(&p)]);
        assert_eq!(counterparts.find(&moved).map(|a| a.id), Some(AssetId(510)));
        assert!(counterparts.find(&newcomer).is_none());
        assert_eq!(counterparts.len(), 1);
    }

    #[test]
    fn orphaned_replica_is_adopted_at_most_once() {
        let p = project();
        let orphan = replica(&p).with_metadata(REPLICATED_INTERNAL_ID, "not-a-number");
        let first = source();
        let mut twin = source();
        twin.id = AssetId(11);

        let counterparts = Counterparts::resolve(&[first.clone(), twin.clone()], &[orphan]);
        assert_eq!(counterparts.find(&first).map(|a| a.id), Some(AssetId(510)));
        assert!(counterparts.find(&twin).is_none());
    }

    #[test]
    fn replica_from_other_project_needs_update() {
        let p = project();
        let other = ProjectName::from("elsewhere");
        let existing = replica(&p).with_metadata(REPLICATED_SOURCE, "elsewhere");
        assert!(needs_update(&source(), &existing, ctx(&p, 100)));
        assert!(!needs_update(&source(), &replica(&other), ctx(&other, 100)));
    }
}
