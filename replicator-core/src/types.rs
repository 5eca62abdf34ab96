//! Domain types for the asset catalog.
//!
//! Internal ids are assigned by the owning store and are only meaningful
//! inside one project. [`SourceId`] and [`DestId`] wrap an [`AssetId`] once
//! it is known which side of a replication it belongs to.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a catalog project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Internal id of an asset, assigned by the store that owns it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetId(pub i64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for AssetId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Internal id of an asset in the source project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub AssetId);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src:{}", self.0)
    }
}

/// Internal id of an asset in the destination project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestId(pub AssetId);

impl fmt::Display for DestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dst:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Free-form string metadata attached to an asset.
///
/// Ordered so catalog files and diffs are deterministic.
pub type Metadata = BTreeMap<String, String>;

/// An asset as stored in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// `None` for root assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AssetId>,
}

impl Asset {
    /// Minimal asset with only an id and a name; handy for fixtures.
    pub fn new(id: impl Into<AssetId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            name: name.into(),
            description: None,
            source: None,
            metadata: Metadata::new(),
            parent_id: None,
        }
    }

    /// Builder-style parent setter.
    pub fn with_parent(mut self, parent: impl Into<AssetId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Builder-style external id setter.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Builder-style metadata setter for a single key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Create payload: everything but the id, which the store assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub external_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub metadata: Metadata,
    pub parent_id: Option<AssetId>,
}

impl NewAsset {
    /// Materialise the payload once the store has picked an id.
    pub fn into_asset(self, id: AssetId) -> Asset {
        Asset {
            id,
            external_id: self.external_id,
            name: self.name,
            description: self.description,
            source: self.source,
            metadata: self.metadata,
            parent_id: self.parent_id,
        }
    }
}

/// Update payload for an existing asset.
///
/// There is no parent field: the hierarchy of an asset is fixed once it has
/// been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub id: AssetId,
    pub external_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub metadata: Metadata,
}

impl AssetUpdate {
    /// Apply this update on top of `current`, returning the new state.
    pub fn apply_to(&self, current: &Asset) -> Asset {
        Asset {
            id: current.id,
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            metadata: self.metadata.clone(),
            parent_id: current.parent_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Id mapping
// ---------------------------------------------------------------------------

/// Per-run correspondence from source internal id to destination internal id.
///
/// Append-only: an entry is added for every asset that was created, updated
/// or found unchanged in the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    ids: HashMap<SourceId, DestId>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceId, dest: DestId) -> Option<DestId> {
        self.ids.insert(source, dest)
    }

    pub fn get(&self, source: SourceId) -> Option<DestId> {
        self.ids.get(&source).copied()
    }

    pub fn contains(&self, source: SourceId) -> bool {
        self.ids.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, DestId)> + '_ {
        self.ids.iter().map(|(s, d)| (*s, *d))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(ProjectName::from("publicdata").to_string(), "publicdata");
        assert_eq!(AssetId(42).to_string(), "42");
        assert_eq!(SourceId(AssetId(7)).to_string(), "src:7");
        assert_eq!(DestId(AssetId(9)).to_string(), "dst:9");
    }

    #[test]
    fn update_keeps_parent_of_current() {
        let current = Asset::new(5, "pump").with_parent(1);
        let update = AssetUpdate {
            id: AssetId(5),
            external_id: Some("P-5".to_string()),
            name: "pump 5".to_string(),
            description: None,
            source: Some("plant".to_string()),
            metadata: Metadata::new(),
        };
        let next = update.apply_to(&current);
        assert_eq!(next.parent_id, Some(AssetId(1)));
        assert_eq!(next.name, "pump 5");
        assert_eq!(current.name, "pump", "input must not be mutated");
    }

    #[test]
    fn mapping_lookup_by_source_id() {
        let mut mapping = IdMapping::new();
        assert!(mapping.is_empty());
        mapping.insert(SourceId(AssetId(1)), DestId(AssetId(100)));
        assert_eq!(mapping.get(SourceId(AssetId(1))), Some(DestId(AssetId(100))));
        assert!(!mapping.contains(SourceId(AssetId(100))));
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn asset_json_omits_empty_optionals() {
        let json = serde_json::to_string(&Asset::new(1, "root")).expect("serialize");
        assert!(!json.contains("parent_id"));
        assert!(!json.contains("external_id"));
        let back: Asset = serde_json::from_str(&json).expect("deserialize");
        assert!(back.is_root());
    }
}
