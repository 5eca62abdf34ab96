//! The asset store contract.
//!
//! A store instance is bound to exactly one project; callers never pass a
//! project name separately, and there is no process-wide client.

use crate::error::StoreError;
use crate::types::{Asset, AssetId, AssetUpdate, NewAsset, ProjectName};

/// Read/write access to the assets of one project.
///
/// Write calls are all-or-nothing per call: if any item is rejected the
/// whole call fails and nothing is written. Callers that want per-item
/// outcomes resubmit items individually.
pub trait AssetStore: Send + Sync {
    /// The project this store reads from and writes to.
    fn project(&self) -> &ProjectName;

    /// Every asset in the project, in store order. Unbounded.
    fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;

    /// Create assets, returning them with their assigned ids, in input order.
    fn create(&self, assets: &[NewAsset]) -> Result<Vec<Asset>, StoreError>;

    /// Apply updates, returning the resulting assets, in input order.
    fn update(&self, updates: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError>;

    /// Delete assets and their descendants. Unknown ids are ignored.
    fn delete(&self, ids: &[AssetId]) -> Result<(), StoreError>;
}

impl<S: AssetStore + ?Sized> AssetStore for &S {
    fn project(&self) -> &ProjectName {
        (**self).project()
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        (**self).list_assets()
    }

    fn create(&self, assets: &[NewAsset]) -> Result<Vec<Asset>, StoreError> {
        (**self).create(assets)
    }

    fn update(&self, updates: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError> {
        (**self).update(updates)
    }

    fn delete(&self, ids: &[AssetId]) -> Result<(), StoreError> {
        (**self).delete(ids)
    }
}
