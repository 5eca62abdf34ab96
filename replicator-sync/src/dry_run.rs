//! Dry-run destination wrapper.
//!
//! [`DryRunStore`] copies the wrapped store's assets into a private shadow
//! catalog on first use and applies every write to the shadow only. Reads
//! see the shadow, so a whole run, sweeps included, behaves as it would for
//! real while the wrapped store is never written.

use std::sync::Mutex;

use replicator_core::{
    Asset, AssetId, AssetStore, AssetUpdate, Catalog, NewAsset, ProjectName, StoreError,
};

/// An [`AssetStore`] that never writes to `inner`.
#[derive(Debug)]
pub struct DryRunStore<S> {
    inner: S,
    shadow: Mutex<Option<Catalog>>,
}

impl<S: AssetStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            shadow: Mutex::new(None),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn with_shadow<T>(
        &self,
        f: impl FnOnce(&mut Catalog) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.shadow.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            *guard = Some(Catalog::from_assets(self.inner.list_assets()?));
        }
        f(guard.get_or_insert_with(Catalog::default))
    }
}

impl<S: AssetStore> AssetStore for DryRunStore<S> {
    fn project(&self) -> &ProjectName {
        self.inner.project()
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        self.with_shadow(|catalog| Ok(catalog.assets.clone()))
    }

    fn create(&self, assets: &[NewAsset]) -> Result<Vec<Asset>, StoreError> {
        tracing::info!("[dry-run] would create {} assets", assets.len());
        self.with_shadow(|catalog| catalog.create(assets))
    }

    fn update(&self, updates: &[AssetUpdate]) -> Result<Vec<Asset>, StoreError> {
        tracing::info!("[dry-run] would update {} assets", updates.len());
        self.with_shadow(|catalog| catalog.update(updates))
    }

    fn delete(&self, ids: &[AssetId]) -> Result<(), StoreError> {
        tracing::info!("[dry-run] would delete {} assets", ids.len());
        self.with_shadow(|catalog| {
            catalog.delete(ids);
            Ok(())
        })
    }
}
