//! Default configuration values

use std::{
    path::{Component, Path, PathBuf},
    time::Duration,
};

use super::types::{BackendConfig, Config, LeaseConfig, LockConfig, MergeConfig};
use crate::{store::LockOptions, vcs::MergeStrategy};

const FOUR_HOURS_SECS: u64 = 4 * 60 * 60;

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: ".tandem".to_string(),
            worktree_dir: "../{repo}__worktrees".to_string(),
            main_branch: None,
            lease: LeaseConfig::default(),
            lock: LockConfig::default(),
            merge: MergeConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            story_ttl_secs: FOUR_HOURS_SECS,
            touch_ttl_secs: FOUR_HOURS_SECS,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        let defaults = LockOptions::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            default_strategy: MergeStrategy::Squash,
            audit_capacity: 50,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DERIVED VALUES
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    pub const fn lock_options(&self) -> LockOptions {
        LockOptions {
            max_retries: self.lock.max_retries,
            base_delay_ms: self.lock.base_delay_ms,
            max_delay_ms: self.lock.max_delay_ms,
        }
    }

    pub const fn story_ttl(&self) -> Duration {
        Duration::from_secs(self.lease.story_ttl_secs)
    }

    pub const fn touch_ttl(&self) -> Duration {
        Duration::from_secs(self.lease.touch_ttl_secs)
    }

    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Absolute state directory for a trunk.
    pub fn state_path(&self, trunk_root: &Path) -> PathBuf {
        trunk_root.join(&self.state_dir)
    }

    /// Absolute base directory for new worktrees of a trunk.
    pub fn worktree_base(&self, trunk_root: &Path) -> PathBuf {
        lexical_clean(&trunk_root.join(&self.worktree_dir))
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut acc, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !acc.pop() {
                        acc.push("..");
                    }
                }
                other => acc.push(other.as_os_str()),
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worktree_base_resolves_parent_components() {
        let config = Config {
            worktree_dir: "../demo__worktrees".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.worktree_base(Path::new("/src/demo")),
            PathBuf::from("/src/demo__worktrees")
        );
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.story_ttl(), Duration::from_secs(14_400));
        assert_eq!(config.touch_ttl(), Duration::from_secs(14_400));
        assert_eq!(config.merge.audit_capacity, 50);
        assert_eq!(config.backend.timeout_secs, 120);
        assert_eq!(config.merge.default_strategy, MergeStrategy::Squash);
    }
}
