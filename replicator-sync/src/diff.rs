//! Plan preview for `replicator diff`.
//!
//! Classifies every source asset against the destination without walking
//! the hierarchy or writing anything, and renders a unified diff of the
//! replicable fields for each asset that would be updated.

use similar::TextDiff;

use replicator_core::{Asset, DestId, Metadata, ProjectName, SourceId};

use crate::classify::{needs_update, Counterparts, RunContext};
use crate::metadata::{self, RunTimestamp, REPLICATED_TIME};

/// A single pending update, rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDiff {
    pub source: SourceId,
    pub destination: DestId,
    pub unified_diff: String,
}

/// What a run would do, hierarchy order aside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub to_create: Vec<SourceId>,
    pub to_update: Vec<AssetDiff>,
    pub unchanged: usize,
}

/// Preview the create/update/unchanged split of `source_assets`.
pub fn plan_updates(
    source_assets: &[Asset],
    destination_assets: &[Asset],
    source_project: &ProjectName,
) -> Plan {
    let counterparts = Counterparts::resolve(source_assets, destination_assets);
    let ctx = RunContext {
        source_project,
        run: RunTimestamp(0),
    };

    let mut plan = Plan::default();
    for source in source_assets {
        match counterparts.find(source) {
            None => plan.to_create.push(SourceId(source.id)),
            Some(existing) if needs_update(source, existing, ctx) => {
                plan.to_update.push(render_diff(source, existing, ctx))
            }
            Some(_) => plan.unchanged += 1,
        }
    }
    plan
}

fn render_diff(source: &Asset, existing: &Asset, ctx: RunContext<'_>) -> AssetDiff {
    let current = render_fields(existing, &existing.metadata);
    let wanted = render_fields(
        source,
        &metadata::tag(source, ctx.source_project, ctx.run),
    );
    let old_header = format!("a/{}", existing.id);
    let new_header = format!("b/{}", source.id);
    let unified_diff = TextDiff::from_lines(&current, &wanted)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    AssetDiff {
        source: SourceId(source.id),
        destination: DestId(existing.id),
        unified_diff,
    }
}

/// One `key: value` line per replicable field, metadata sorted by key.
fn render_fields(asset: &Asset, metadata: &Metadata) -> String {
    let mut out = String::new();
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    out.push_str(&format!("external_id: {}\n", opt(&asset.external_id)));
    out.push_str(&format!("name: {}\n", asset.name));
    out.push_str(&format!("description: {}\n", opt(&asset.description)));
    out.push_str(&format!("source: {}\n", opt(&asset.source)));
    for (key, value) in metadata.iter().filter(|(k, _)| k.as_str() != REPLICATED_TIME) {
        out.push_str(&format!("metadata.{key}: {value}\n"));
    }
    out
}
