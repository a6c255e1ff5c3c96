//! Validation-focused tests for configuration

use std::path::Path;

use super::Config;

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_zero_ttl_is_rejected() {
    let mut config = Config::default();
    config.lease.story_ttl_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_audit_capacity_is_rejected() {
    let mut config = Config::default();
    config.merge.audit_capacity = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_backend_timeout_is_rejected() {
    let mut config = Config::default();
    config.backend.timeout_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_inverted_lock_delays_are_rejected() {
    let mut config = Config::default();
    config.lock.base_delay_ms = 500;
    config.lock.max_delay_ms = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_main_branch_is_rejected() {
    let config = Config {
        main_branch: Some("main; echo".to_string()),
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert_eq!(err.code(), "INVALID_CONFIG");
}

#[test]
fn test_repo_placeholder_substitution() {
    let config = Config::default().substitute_placeholders(Path::new("/src/widget"));
    assert_eq!(config.worktree_dir, "../widget__worktrees");
}

#[test]
fn test_merge_keeps_base_when_override_is_default() {
    let base = Config {
        state_dir: ".coord".to_string(),
        ..Config::default()
    };
    let merged = base.merge(Config::default());
    assert_eq!(merged.state_dir, ".coord");
}
