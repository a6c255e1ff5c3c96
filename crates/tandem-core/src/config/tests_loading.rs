//! Loading-focused tests: file layering, placeholders, environment overrides.

use std::path::Path;

use serial_test::serial;
use tempfile::TempDir;

use super::{load_config_from, load_toml_file, Config};
use crate::{vcs::MergeStrategy, Error};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[test]
#[serial]
fn test_no_config_files_returns_defaults() {
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");

    let config = load_config_from(None, &trunk.join(".tandem/config.toml"), &trunk).unwrap();

    assert_eq!(config.worktree_dir, "../demo__worktrees");
    assert_eq!(config.state_dir, ".tandem");
    assert_eq!(config.lease, Config::default().lease);
}

#[test]
#[serial]
fn test_project_overrides_global() {
    // GIVEN: a global config and a project config that disagree
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");
    let global = dir.path().join("global.toml");
    let project = trunk.join(".tandem/config.toml");
    write(
        &global,
        "main_branch = \"trunk\"\n[lease]\nstory_ttl_secs = 60\ntouch_ttl_secs = 90\n",
    );
    write(&project, "[lease]\nstory_ttl_secs = 120\n");

    // WHEN: loading
    let config = load_config_from(Some(&global), &project, &trunk).unwrap();

    // THEN: project wins where set, global fills the rest
    assert_eq!(config.lease.story_ttl_secs, 120);
    assert_eq!(config.lease.touch_ttl_secs, 90);
    assert_eq!(config.main_branch.as_deref(), Some("trunk"));
}

#[test]
#[serial]
fn test_merge_strategy_parses_from_file() {
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");
    let project = trunk.join(".tandem/config.toml");
    write(&project, "[merge]\ndefault_strategy = \"merge\"\n");

    let config = load_config_from(None, &project, &trunk).unwrap();
    assert_eq!(config.merge.default_strategy, MergeStrategy::Merge);
}

#[test]
fn test_malformed_toml_is_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    write(&path, "worktree_dir = \n invalid toml [[[");

    let err = load_toml_file(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_directory_instead_of_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(load_toml_file(dir.path()).is_err());
}

#[test]
#[serial]
fn test_env_overrides_files() {
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");
    let project = trunk.join(".tandem/config.toml");
    write(&project, "[backend]\ntimeout_secs = 30\n");

    std::env::set_var("TANDEM_BACKEND_TIMEOUT_SECS", "45");
    std::env::set_var("TANDEM_MERGE_STRATEGY", "merge");
    let result = load_config_from(None, &project, &trunk);
    std::env::remove_var("TANDEM_BACKEND_TIMEOUT_SECS");
    std::env::remove_var("TANDEM_MERGE_STRATEGY");

    let config = result.unwrap();
    assert_eq!(config.backend.timeout_secs, 45);
    assert_eq!(config.merge.default_strategy, MergeStrategy::Merge);
}

#[test]
#[serial]
fn test_unparseable_env_value_is_invalid_config() {
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");

    std::env::set_var("TANDEM_STORY_TTL_SECS", "four hours");
    let result = load_config_from(None, &trunk.join(".tandem/config.toml"), &trunk);
    std::env::remove_var("TANDEM_STORY_TTL_SECS");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("TANDEM_STORY_TTL_SECS"));
}

#[test]
#[serial]
fn test_empty_main_branch_env_is_rejected() {
    let dir = TempDir::new().unwrap();
    let trunk = dir.path().join("demo");

    std::env::set_var("TANDEM_MAIN_BRANCH", "");
    let result = load_config_from(None, &trunk.join(".tandem/config.toml"), &trunk);
    std::env::remove_var("TANDEM_MAIN_BRANCH");

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
