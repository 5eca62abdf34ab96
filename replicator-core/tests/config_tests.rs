//! Config load error messages and parameterised validation.

use std::fs;

use replicator_core::{config, ConfigError, ReplicatorConfig};
use rstest::rstest;
use tempfile::TempDir;

fn write_config(home: &TempDir, yaml: &str) {
    let path = config::config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, yaml).expect("write");
}

#[test]
fn load_missing_config_returns_not_found() {
    let home = TempDir::new().expect("tempdir");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("replicator.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");
    let err = config::load_at(home.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("replicator.yaml"));
}

#[test]
fn save_then_load_roundtrip() {
    let home = TempDir::new().expect("tempdir");
    let mut cfg = ReplicatorConfig::new("publicdata", "sandbox");
    cfg.delete_replicated_if_not_in_source = true;
    cfg.catalog_root = Some(home.path().join("catalogs"));
    let path = config::config_path_at(home.path());
    config::save_to(&path, &cfg).expect("save");
    assert!(!path.with_extension("yaml.tmp").exists());

    let loaded = config::load_at(home.path()).expect("load");
    assert_eq!(loaded, cfg);
}

#[rstest]
#[case("same_projects", "source: { project: a }\ndestination: { project: a }\n")]
#[case(
    "zero_attempts",
    "source: { project: a }\ndestination: { project: b }\nretry: { max_attempts: 0 }\n"
)]
#[case(
    "backoff_inverted",
    "source: { project: a }\ndestination: { project: b }\nretry: { base_backoff_ms: 10, max_backoff_ms: 5 }\n"
)]
#[case("empty_name", "source: { project: '' }\ndestination: { project: b }\n")]
#[case("parent_dir", "source: { project: '..' }\ndestination: { project: b }\n")]
#[case("nested_path", "source: { project: a }\ndestination: { project: '../escape' }\n")]
#[case("backslash", "source: { project: 'a\\b' }\ndestination: { project: b }\n")]
fn invalid_configs_are_rejected(#[case] label: &str, #[case] yaml: &str) {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, yaml);
    let err = config::load_at(home.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid(_)),
        "[{label}] expected Invalid, got: {err}"
    );
}
