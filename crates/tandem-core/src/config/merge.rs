//! Configuration merging logic
//!
//! Later configs override earlier ones (defaults → global → project → env →
//! CLI). A field in the overriding config that still holds its built-in
//! default is treated as "not set" and leaves the earlier value in place.

use super::types::{BackendConfig, Config, LeaseConfig, LockConfig, MergeConfig};

fn pick<T: PartialEq>(base: T, other: T, default: T) -> T {
    if other == default {
        base
    } else {
        other
    }
}

impl Config {
    /// Merge another config into this one (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            state_dir: pick(self.state_dir, other.state_dir, defaults.state_dir),
            worktree_dir: pick(self.worktree_dir, other.worktree_dir, defaults.worktree_dir),
            main_branch: other.main_branch.or(self.main_branch),
            lease: self.lease.merge(other.lease),
            lock: self.lock.merge(other.lock),
            merge: self.merge.merge(other.merge),
            backend: self.backend.merge(other.backend),
        }
    }
}

impl LeaseConfig {
    fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            story_ttl_secs: pick(self.story_ttl_secs, other.story_ttl_secs, defaults.story_ttl_secs),
            touch_ttl_secs: pick(self.touch_ttl_secs, other.touch_ttl_secs, defaults.touch_ttl_secs),
        }
    }
}

impl LockConfig {
    fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: pick(self.max_retries, other.max_retries, defaults.max_retries),
            base_delay_ms: pick(self.base_delay_ms, other.base_delay_ms, defaults.base_delay_ms),
            max_delay_ms: pick(self.max_delay_ms, other.max_delay_ms, defaults.max_delay_ms),
        }
    }
}

impl MergeConfig {
    fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            default_strategy: pick(
                self.default_strategy,
                other.default_strategy,
                defaults.default_strategy,
            ),
            audit_capacity: pick(self.audit_capacity, other.audit_capacity, defaults.audit_capacity),
        }
    }
}

impl BackendConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            timeout_secs: pick(self.timeout_secs, other.timeout_secs, Self::default().timeout_secs),
        }
    }
}
