//! Config-driven entrypoints used by the CLI.

use std::path::Path;

use replicator_core::{AssetStore, CatalogStore, ReplicatorConfig};

use crate::diff::{plan_updates, Plan};
use crate::dry_run::DryRunStore;
use crate::replicate::{replicate, ReplicateOptions, ReplicationReport};
use crate::SyncError;

/// Source and destination catalog stores named by `config`.
pub fn catalog_stores(home: &Path, config: &ReplicatorConfig) -> (CatalogStore, CatalogStore) {
    let root = config.catalog_root_at(home);
    (
        CatalogStore::new(&root, config.source.project.clone()),
        CatalogStore::new(&root, config.destination.project.clone()),
    )
}

/// Run one replication as configured.
///
/// With `dry_run` the destination catalog is never written; the report
/// describes what the run would have done.
pub fn run(
    home: &Path,
    config: &ReplicatorConfig,
    options: &ReplicateOptions,
    dry_run: bool,
) -> Result<ReplicationReport, SyncError> {
    config.validate()?;
    let (source, destination) = catalog_stores(home, config);
    if dry_run {
        let shadow = DryRunStore::new(destination);
        replicate(&source, &shadow, options)
    } else {
        replicate(&source, &destination, options)
    }
}

/// Preview the run without writing anything.
pub fn plan(home: &Path, config: &ReplicatorConfig) -> Result<Plan, SyncError> {
    config.validate()?;
    let (source, destination) = catalog_stores(home, config);
    Ok(plan_updates(
        &source.list_assets()?,
        &destination.list_assets()?,
        &config.source.project,
    ))
}

#[cfg(test)]
mod tests {
    use replicator_core::{catalog, Asset, Catalog};
    use tempfile::TempDir;

    use super::*;

    fn seeded_home(source: Vec<Asset>) -> (TempDir, ReplicatorConfig) {
        let home = TempDir::new().expect("home");
        let mut config = ReplicatorConfig::new("publicdata", "sandbox");
        config.catalog_root = Some(home.path().join("catalogs"));
        let root = config.catalog_root_at(home.path());
        catalog::save_at(&root, &config.source.project, &Catalog::from_assets(source))
            .expect("seed source");
        (home, config)
    }

    #[test]
    fn dry_run_leaves_destination_catalog_absent() {
        let (home, config) = seeded_home(vec![
            Asset::new(1, "site"),
            Asset::new(2, "pump").with_parent(1),
        ]);
        let report =
            run(home.path(), &config, &ReplicateOptions::default(), true).expect("dry run");
        assert_eq!(report.hierarchy.created(), 2);

        let (_, destination) = catalog_stores(home.path(), &config);
        assert!(!destination.path().exists(), "dry-run must not write the catalog");
    }

    #[test]
    fn real_run_then_plan_is_clean() {
        let (home, config) = seeded_home(vec![Asset::new(1, "site")]);
        run(home.path(), &config, &ReplicateOptions::default(), false).expect("run");

        let plan = plan(home.path(), &config).expect("plan");
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_io() {
        let home = TempDir::new().expect("home");
        let config = ReplicatorConfig::new("same", "same");
        let err = run(home.path(), &config, &ReplicateOptions::default(), false).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
