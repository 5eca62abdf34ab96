//! Replicator core library: domain types, store contract, stores, config.
//!
//! - [`types`]: assets, id newtypes, [`IdMapping`]
//! - [`error`]: [`StoreError`], [`ConfigError`]
//! - [`store`]: the [`AssetStore`] trait
//! - [`memory`] / [`catalog`]: in-memory and file-backed stores
//! - [`config`]: `replicator.yaml` load / save

pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use catalog::{Catalog, CatalogStore};
pub use config::{ReplicatorConfig, RetryConfig};
pub use error::{ConfigError, RetryClass, StoreError};
pub use memory::MemoryStore;
pub use store::AssetStore;
pub use types::{
    Asset, AssetId, AssetUpdate, DestId, IdMapping, Metadata, NewAsset, ProjectName, SourceId,
};
