//! In-process asset store.

use std::sync::{Mutex, MutexGuard};

use crate::catalog::Catalog;
use crate::error::StoreError;
use crate::store::AssetStore;
use crate::types::{Asset, AssetId, AssetUpdate, NewAsset, ProjectName};

/// [`AssetStore`] holding its catalog in memory.
#[derive(Debug)]
pub struct MemoryStore {
    project: ProjectName,
    catalog: Mutex<Catalog>,
}

impl MemoryStore {
    /// Empty project whose ids start at 1.
    pub fn new(project: impl Into<ProjectName>) -> Self {
        Self::from_catalog(project, Catalog::default())
    }

    /// Empty project whose ids start at `first_id`.
    pub fn starting_at(project: impl Into<ProjectName>, first_id: i64) -> Self {
        Self::from_catalog(project, Catalog::starting_at(first_id))
    }

    /// Project pre-populated with `assets`, taken as-is.
    pub fn with_assets(project: impl Into<ProjectName>, assets: Vec<Asset>) -> Self {
        Self::from_catalog(project, Catalog::from_assets(assets))
    }

    pub fn from_catalog(project: impl Into<ProjectName>, catalog: Catalog) -> Self {
        Self {
            project: project.into(),
            catalog: Mutex::new(catalog),
        }
    }

    /// Snapshot of the current catalog.
    pub fn snapshot(&self) -> Catalog {
        self.lock().clone()
    }

    pub fn get(&self, id: AssetId) -> Option<Asset> {
        self.lock().get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // A panic while holding the lock cannot leave a half-applied write:
        // catalog mutations are all-or-nothing.
        self.catalog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AssetStore for MemoryStore {
    fn project(&self) -> &ProjectName {
        &self.project
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        Ok(self.lock().assets.clone())
    }

    fn create(&self, assets: &[NewAsset]) -> Result<Vec<Asset>, StoreError> {
        self.lock().create(assets)
    }

    fn update(&self, updates: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError> {
        self.lock().update(updates)
    }

    fn delete(&self, ids: &[AssetId]) -> Result<(), StoreError> {
        self.lock().delete(ids);
        Ok(())
    }
}
