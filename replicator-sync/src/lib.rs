//! # replicator-sync
//!
//! Hierarchy-aware, idempotent asset replication between two projects.
//!
//! Call [`replicate`] with a source and a destination store, or
//! [`pipeline::run`] to drive a run from a [`replicator_core::ReplicatorConfig`].

pub mod classify;
pub mod diff;
pub mod dry_run;
pub mod error;
pub mod hierarchy;
pub mod metadata;
pub mod pipeline;
pub mod reconcile;
pub mod replicate;
pub mod retry;

pub use diff::{plan_updates, AssetDiff, Plan};
pub use dry_run::DryRunStore;
pub use error::SyncError;
pub use hierarchy::{create_hierarchy, HierarchyOutcome, LevelReport, WalkOptions};
pub use metadata::RunTimestamp;
pub use replicate::{replicate, replicate_at, ReplicateOptions, ReplicationReport};
pub use retry::RetryPolicy;
