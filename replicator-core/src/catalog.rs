//! Per-project asset catalog and its file-backed store.
//!
//! # Storage layout
//!
//! ```text
//! <catalog_root>/
//!   <project>.json      (one catalog per project)
//! ```
//!
//! Writes use the same atomic `.tmp` + rename pattern as the config. A
//! missing catalog file is an empty project.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::store::AssetStore;
use crate::types::{Asset, AssetId, AssetUpdate, NewAsset, ProjectName};

// ---------------------------------------------------------------------------
// 1. In-memory catalog
// ---------------------------------------------------------------------------

/// The full asset state of one project plus its id counter.
///
/// Every mutating method is all-or-nothing: on error the catalog is left
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub next_id: i64,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_id: 1,
            assets: Vec::new(),
        }
    }
}

impl Catalog {
    /// Empty catalog that hands out ids starting at `first_id`.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            next_id: first_id,
            assets: Vec::new(),
        }
    }

    /// Catalog seeded with existing assets, taken as-is.
    ///
    /// The id counter continues after the largest seeded id. A catalog
    /// already holding `i64::MAX` accepts no further creates.
    pub fn from_assets(assets: Vec<Asset>) -> Self {
        let next_id = assets
            .iter()
            .map(|a| a.id.0.saturating_add(1))
            .max()
            .unwrap_or(1)
            .max(1);
        Self { next_id, assets }
    }

    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn create(&mut self, batch: &[NewAsset]) -> Result<Vec<Asset>, StoreError> {
        let existing: HashSet<AssetId> = self.assets.iter().map(|a| a.id).collect();
        let mut external_ids: HashSet<&str> = self
            .assets
            .iter()
            .filter_map(|a| a.external_id.as_deref())
            .collect();

        for new in batch {
            if let Some(parent) = new.parent_id {
                if !existing.contains(&parent) {
                    return Err(StoreError::UnknownParent { parent });
                }
            }
            if let Some(xid) = new.external_id.as_deref() {
                if !external_ids.insert(xid) {
                    return Err(StoreError::DuplicateExternalId {
                        external_id: xid.to_string(),
                    });
                }
            }
        }
        let next_id = i64::try_from(batch.len())
            .ok()
            .and_then(|n| self.next_id.checked_add(n))
            .ok_or_else(|| {
                StoreError::rejected(format!(
                    "asset id space exhausted: cannot assign {} ids after {}",
                    batch.len(),
                    self.next_id
                ))
            })?;

        let created: Vec<Asset> = batch
            .iter()
            .zip(self.next_id..)
            .map(|(new, id)| new.clone().into_asset(AssetId(id)))
            .collect();
        self.next_id = next_id;
        self.assets.extend(created.iter().cloned());
        Ok(created)
    }

    pub fn update(&mut self, batch: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError> {
        let mut next = self.assets.clone();
        let positions: HashMap<AssetId, usize> =
            next.iter().enumerate().map(|(i, a)| (a.id, i)).collect();

        let mut updated = Vec::with_capacity(batch.len());
        for update in batch {
            let Some(&pos) = positions.get(&update.id) else {
                return Err(StoreError::UnknownAsset { id: update.id });
            };
            if let Some(xid) = update.external_id.as_deref() {
                let taken = next
                    .iter()
                    .any(|a| a.id != update.id && a.external_id.as_deref() == Some(xid));
                if taken {
                    return Err(StoreError::DuplicateExternalId {
                        external_id: xid.to_string(),
                    });
                }
            }
            let asset = update.apply_to(&next[pos]);
            next[pos] = asset.clone();
            updated.push(asset);
        }

        self.assets = next;
        Ok(updated)
    }

    /// Remove `ids` and every descendant of them. Returns how many assets
    /// were removed.
    pub fn delete(&mut self, ids: &[AssetId]) -> usize {
        let mut doomed: HashSet<AssetId> = ids.iter().copied().collect();
        loop {
            let before = doomed.len();
            for asset in &self.assets {
                if let Some(parent) = asset.parent_id {
                    if doomed.contains(&parent) {
                        doomed.insert(asset.id);
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        let before = self.assets.len();
        self.assets.retain(|a| !doomed.contains(&a.id));
        before - self.assets.len()
    }
}

// ---------------------------------------------------------------------------
// 2. Persistence
// ---------------------------------------------------------------------------

/// `<root>/<project>.json`: pure, no I/O.
pub fn catalog_path_at(root: &Path, project: &ProjectName) -> PathBuf {
    root.join(format!("{}.json", project.0))
}

/// Load the catalog of `project`. Returns an empty catalog if absent.
pub fn load_at(root: &Path, project: &ProjectName) -> Result<Catalog, StoreError> {
    let path = catalog_path_at(root, project);
    if !path.exists() {
        return Ok(Catalog::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the catalog of `project` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(root: &Path, project: &ProjectName, catalog: &Catalog) -> Result<(), StoreError> {
    std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

    let path = catalog_path_at(root, project);
    let json = serde_json::to_string_pretty(catalog)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. File-backed store
// ---------------------------------------------------------------------------

/// [`AssetStore`] over a catalog file.
///
/// Every call loads the file fresh and every successful write saves it, so
/// two stores on the same file always agree.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    root: PathBuf,
    project: ProjectName,
}

impl CatalogStore {
    pub fn new(root: impl Into<PathBuf>, project: ProjectName) -> Self {
        Self {
            root: root.into(),
            project,
        }
    }

    pub fn path(&self) -> PathBuf {
        catalog_path_at(&self.root, &self.project)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Catalog) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut catalog = load_at(&self.root, &self.project)?;
        let out = f(&mut catalog)?;
        save_at(&self.root, &self.project, &catalog)?;
        Ok(out)
    }
}

impl AssetStore for CatalogStore {
    fn project(&self) -> &ProjectName {
        &self.project
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        Ok(load_at(&self.root, &self.project)?.assets)
    }

    fn create(&self, assets: &[NewAsset]) -> Result<Vec<Asset>, StoreError> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }
        self.mutate(|catalog| catalog.create(assets))
    }

    fn update(&self, updates: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        self.mutate(|catalog| catalog.update(updates))
    }

    fn delete(&self, ids: &[AssetId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.mutate(|catalog| {
            catalog.delete(ids);
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
