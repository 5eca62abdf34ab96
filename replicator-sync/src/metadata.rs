//! Replication provenance tags.
//!
//! Every asset this crate writes to a destination carries these keys in its
//! metadata. They are the only durable state shared between runs.

use chrono::{DateTime, TimeZone, Utc};

use replicator_core::{Asset, AssetId, Metadata, ProjectName, SourceId};

/// Name of the project the asset was replicated from.
pub const REPLICATED_SOURCE: &str = "_replicatedSource";
/// Internal id of the source asset, as a decimal string.
pub const REPLICATED_INTERNAL_ID: &str = "_replicatedInternalId";
/// External id of the source asset, when it has one.
pub const REPLICATED_EXTERNAL_ID: &str = "_replicatedExternalId";
/// Run timestamp of the write, in epoch milliseconds.
pub const REPLICATED_TIME: &str = "_replicatedTime";

/// All keys owned by the replicator.
pub const REPLICATION_KEYS: [&str; 4] = [
    REPLICATED_SOURCE,
    REPLICATED_INTERNAL_ID,
    REPLICATED_EXTERNAL_ID,
    REPLICATED_TIME,
];

/// Shared timestamp stamped on every record written during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunTimestamp(pub i64);

impl RunTimestamp {
    /// Current time in epoch milliseconds, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp() * 1000)
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl std::fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Metadata for the replica of `source`: its own metadata plus fresh
/// replication keys. Stale replication keys copied from `source` are
/// replaced or dropped.
pub fn tag(source: &Asset, source_project: &ProjectName, run: RunTimestamp) -> Metadata {
    let mut metadata = strip_replication_keys(&source.metadata);
    metadata.insert(REPLICATED_SOURCE.to_string(), source_project.0.clone());
    metadata.insert(REPLICATED_INTERNAL_ID.to_string(), source.id.0.to_string());
    if let Some(xid) = &source.external_id {
        metadata.insert(REPLICATED_EXTERNAL_ID.to_string(), xid.clone());
    }
    metadata.insert(REPLICATED_TIME.to_string(), run.0.to_string());
    metadata
}

/// Copy of `metadata` without any replication key.
pub fn strip_replication_keys(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter(|(k, _)| !REPLICATION_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `true` when `asset` carries a non-empty `_replicatedSource`.
pub fn is_replicated(asset: &Asset) -> bool {
    asset
        .metadata
        .get(REPLICATED_SOURCE)
        .is_some_and(|s| !s.trim().is_empty())
}

/// The source id recorded on a replica.
///
/// `None` when the tag is missing or not an integer.
pub fn replicated_internal_id(asset: &Asset) -> Option<SourceId> {
    asset
        .metadata
        .get(REPLICATED_INTERNAL_ID)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(|id| SourceId(AssetId(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_asset() -> Asset {
        Asset::new(17, "compressor")
            .with_external_id("C-17")
            .with_metadata("vendor", "acme")
    }

    #[test]
    fn tag_adds_provenance_and_keeps_own_metadata() {
        let md = tag(&source_asset(), &ProjectName::from("publicdata"), RunTimestamp(1_000));
        assert_eq!(md.get("vendor").map(String::as_str), Some("acme"));
        assert_eq!(md.get(REPLICATED_SOURCE).map(String::as_str), Some("publicdata"));
        assert_eq!(md.get(REPLICATED_INTERNAL_ID).map(String::as_str), Some("17"));
        assert_eq!(md.get(REPLICATED_EXTERNAL_ID).map(String::as_str), Some("C-17"));
        assert_eq!(md.get(REPLICATED_TIME).map(String::as_str), Some("1000"));
    }

    #[test]
    fn tag_overwrites_inherited_replication_keys() {
        let asset = Asset::new(3, "x")
            .with_metadata(REPLICATED_SOURCE, "upstream")
            .with_metadata(REPLICATED_INTERNAL_ID, "999")
            .with_metadata(REPLICATED_EXTERNAL_ID, "stale");
        let md = tag(&asset, &ProjectName::from("mid"), RunTimestamp(5));
        assert_eq!(md.get(REPLICATED_SOURCE).map(String::as_str), Some("mid"));
        assert_eq!(md.get(REPLICATED_INTERNAL_ID).map(String::as_str), Some("3"));
        assert!(!md.contains_key(REPLICATED_EXTERNAL_ID));
        assert_eq!(asset.metadata.get(REPLICATED_SOURCE).map(String::as_str), Some("upstream"));
    }

    #[test]
    fn empty_or_missing_source_tag_is_organic() {
        assert!(!is_replicated(&Asset::new(1, "a")));
        assert!(!is_replicated(&Asset::new(1, "a").with_metadata(REPLICATED_SOURCE, " ")));
        assert!(is_replicated(&Asset::new(1, "a").with_metadata(REPLICATED_SOURCE, "p")));
    }

    #[test]
    fn malformed_internal_id_reads_as_none() {
        let asset = Asset::new(1, "a").with_metadata(REPLICATED_INTERNAL_ID, "abc");
        assert_eq!(replicated_internal_id(&asset), None);
        let asset = Asset::new(1, "a").with_metadata(REPLICATED_INTERNAL_ID, "12");
        assert_eq!(replicated_internal_id(&asset), Some(SourceId(AssetId(12))));
    }

    #[test]
    fn run_timestamp_truncates_to_seconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_789).single().expect("ts");
        assert_eq!(RunTimestamp::from_datetime(at), RunTimestamp(1_700_000_000_000));
    }
}
