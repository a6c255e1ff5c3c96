//! Configuration validation and placeholder substitution

use std::path::Path;

use super::types::Config;
use crate::{validation, Error, Result};

impl Config {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any value is zero where a positive value is required,
    /// or a path or branch setting is empty or malformed
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.trim().is_empty() {
            return Err(Error::invalid_config("state_dir cannot be empty"));
        }

        if self.worktree_dir.trim().is_empty() {
            return Err(Error::invalid_config("worktree_dir cannot be empty"));
        }

        if let Some(branch) = &self.main_branch {
            if branch.trim().is_empty() {
                return Err(Error::invalid_config(
                    "main_branch cannot be empty - either unset it or provide a branch name",
                ));
            }
            validation::validate_branch_name(branch)
                .map_err(|e| Error::invalid_config(format!("main_branch: {e}")))?;
        }

        if self.lease.story_ttl_secs == 0 || self.lease.touch_ttl_secs == 0 {
            return Err(Error::invalid_config("lease TTLs must be at least 1 second"));
        }

        if self.lock.base_delay_ms == 0 || self.lock.max_delay_ms < self.lock.base_delay_ms {
            return Err(Error::invalid_config(
                "lock.base_delay_ms must be positive and not exceed lock.max_delay_ms",
            ));
        }

        if self.merge.audit_capacity == 0 {
            return Err(Error::invalid_config("merge.audit_capacity must be at least 1"));
        }

        if self.backend.timeout_secs == 0 {
            return Err(Error::invalid_config("backend.timeout_secs must be at least 1"));
        }

        Ok(())
    }

    /// Substitute `{repo}` with the trunk directory name
    pub fn substitute_placeholders(mut self, trunk_root: &Path) -> Self {
        let repo_name = trunk_root
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("repo");
        self.worktree_dir = self.worktree_dir.replace("{repo}", repo_name);
        self
    }
}
