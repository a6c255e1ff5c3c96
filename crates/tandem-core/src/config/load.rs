//! Configuration loading from files and environment
//!
//! Every step returns a new `Config` rather than mutating a shared one.

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration for the repository rooted at `trunk_root`.
///
/// # Errors
///
/// Returns error if:
/// - A config file is malformed TOML
/// - An environment override cannot be parsed
/// - Config values fail validation
pub fn load_config(trunk_root: &Path) -> Result<Config> {
    load_config_from(
        global_config_path().as_deref(),
        &project_config_path(trunk_root),
        trunk_root,
    )
}

/// Load configuration from explicit file locations.
///
/// Missing files are skipped; `trunk_root` names the `{repo}` placeholder.
pub fn load_config_from(
    global_path: Option<&Path>,
    project_path: &Path,
    trunk_root: &Path,
) -> Result<Config> {
    // 1. Built-in defaults
    let config = Config::default();

    // 2. Global config
    let config = match global_path.filter(|path| path.exists()) {
        Some(path) => config.merge(load_toml_file(path)?),
        None => config,
    };

    // 3. Project config overrides global
    let config = if project_path.exists() {
        config.merge(load_toml_file(project_path)?)
    } else {
        config
    };

    // 4. Environment variables
    let config = config.apply_env_vars()?;

    // 5. Validate and substitute placeholders
    config.validate()?;
    let config = config.substitute_placeholders(trunk_root);

    tracing::debug!("Loaded configuration: {config:?}");
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// PATH HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tandem")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Project config always lives in the default state directory of the trunk.
pub fn project_config_path(trunk_root: &Path) -> PathBuf {
    trunk_root.join(".tandem").join("config.toml")
}

/// Load a TOML file into a Config (absent keys take their defaults)
///
/// # Errors
///
/// Returns error if the file cannot be read, is a directory, or is malformed.
pub fn load_toml_file(path: &Path) -> Result<Config> {
    if path.is_dir() {
        return Err(Error::io_error(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::io_error(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::invalid_config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLE OVERRIDES
// ═══════════════════════════════════════════════════════════════════════════

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name).ok().map_or(Ok(None), |value| {
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::invalid_config(format!("Invalid {name} value '{value}': {e}")))
    })
}

impl Config {
    /// Apply `TANDEM_*` environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable value cannot be parsed
    pub fn apply_env_vars(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var("TANDEM_STATE_DIR") {
            self.state_dir = value;
        }

        if let Ok(value) = std::env::var("TANDEM_WORKTREE_DIR") {
            self.worktree_dir = value;
        }

        if let Ok(value) = std::env::var("TANDEM_MAIN_BRANCH") {
            if value.is_empty() {
                return Err(Error::invalid_config(
                    "TANDEM_MAIN_BRANCH cannot be empty - unset the variable or provide a branch name",
                ));
            }
            self.main_branch = Some(value);
        }

        if let Some(secs) = env_parse("TANDEM_STORY_TTL_SECS")? {
            self.lease.story_ttl_secs = secs;
        }

        if let Some(secs) = env_parse("TANDEM_TOUCH_TTL_SECS")? {
            self.lease.touch_ttl_secs = secs;
        }

        if let Some(retries) = env_parse("TANDEM_LOCK_MAX_RETRIES")? {
            self.lock.max_retries = retries;
        }

        if let Some(strategy) = env_parse("TANDEM_MERGE_STRATEGY")? {
            self.merge.default_strategy = strategy;
        }

        if let Some(capacity) = env_parse("TANDEM_AUDIT_CAPACITY")? {
            self.merge.audit_capacity = capacity;
        }

        if let Some(secs) = env_parse("TANDEM_BACKEND_TIMEOUT_SECS")? {
            self.backend.timeout_secs = secs;
        }

        Ok(self)
    }
}
