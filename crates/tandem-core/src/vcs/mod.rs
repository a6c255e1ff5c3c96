//! Version-control backend interface.
//!
//! The coordinator never touches repository internals itself; every read and
//! write goes through [`VcsBackend`]. [`git::GitBackend`] is the production
//! implementation and shells out to the `git` CLI. Tests substitute an
//! in-memory fake.
//!
//! Directory arguments name where the command runs: `trunk` is the main
//! working copy, `dir` any working copy (trunk or a linked worktree).

pub mod git;
pub mod parse;

use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::Result;

pub use git::GitBackend;

/// How a session branch lands on trunk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MergeStrategy {
    /// All session commits collapse into one trunk commit
    #[default]
    Squash,
    /// A merge commit joins the session history to trunk
    Merge,
}

/// Which side of a conflicted path to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    /// The trunk version
    Ours,
    /// The session version
    Theirs,
}

/// Commit distance between trunk and a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AheadBehind {
    /// Commits on the branch that trunk does not have
    pub ahead: u32,
    /// Commits on trunk that the branch does not have
    pub behind: u32,
}

/// Result of a non-destructive trial merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "paths", rename_all = "lowercase")]
pub enum TrialOutcome {
    Clean,
    Conflicted(Vec<String>),
}

#[async_trait]
pub trait VcsBackend: Send + Sync + fmt::Debug {
    /// Root of the main working copy of the repository containing `cwd`.
    async fn trunk_root(&self, cwd: &Path) -> Result<PathBuf>;

    /// Top-level directory of the working copy containing `cwd`.
    async fn worktree_root(&self, cwd: &Path) -> Result<PathBuf>;

    async fn current_branch(&self, dir: &Path) -> Result<String>;

    async fn head_commit(&self, dir: &Path) -> Result<String>;

    async fn branch_exists(&self, trunk: &Path, branch: &str) -> Result<bool>;

    async fn create_branch(&self, trunk: &Path, branch: &str, from: &str) -> Result<()>;

    /// `force` deletes even when git considers the branch unmerged.
    async fn delete_branch(&self, trunk: &Path, branch: &str, force: bool) -> Result<()>;

    async fn add_worktree(&self, trunk: &Path, path: &Path, branch: &str) -> Result<()>;

    async fn remove_worktree(&self, trunk: &Path, path: &Path, force: bool) -> Result<()>;

    /// `true` when `dir` is a linked worktree rather than the main working copy.
    async fn is_linked_worktree(&self, dir: &Path) -> Result<bool>;

    /// Uncommitted changes to tracked files.
    async fn is_dirty(&self, dir: &Path) -> Result<bool>;

    async fn merge_base(&self, trunk: &Path, a: &str, b: &str) -> Result<String>;

    /// Paths that differ between two revisions.
    async fn changed_paths(&self, trunk: &Path, from: &str, to: &str) -> Result<BTreeSet<String>>;

    async fn ahead_behind(&self, trunk: &Path, base: &str, branch: &str) -> Result<AheadBehind>;

    /// Merge `branch` into trunk without committing, report, and always undo.
    async fn trial_merge(&self, trunk: &Path, branch: &str) -> Result<TrialOutcome>;

    /// Merge and commit in one go. Only valid when a trial merge was clean.
    async fn merge(
        &self,
        trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<()>;

    /// Start a merge that is expected to conflict and leave it in progress.
    ///
    /// Returns the conflicted paths.
    async fn start_merge(
        &self,
        trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
    ) -> Result<Vec<String>>;

    async fn unmerged_paths(&self, trunk: &Path) -> Result<Vec<String>>;

    async fn checkout_side(&self, trunk: &Path, path: &str, side: Side) -> Result<()>;

    async fn stage(&self, trunk: &Path, paths: &[String]) -> Result<()>;

    async fn commit(&self, trunk: &Path, message: &str) -> Result<()>;

    /// Abandon an in-progress merge and restore the pre-merge state.
    async fn abort_merge(&self, trunk: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_merge_strategy_parses_case_insensitively() {
        assert_eq!(MergeStrategy::from_str("squash").ok(), Some(MergeStrategy::Squash));
        assert_eq!(MergeStrategy::from_str("MERGE").ok(), Some(MergeStrategy::Merge));
        assert!(MergeStrategy::from_str("rebase").is_err());
    }

    #[test]
    fn test_merge_strategy_display_round_trips() {
        assert_eq!(MergeStrategy::Squash.to_string(), "squash");
        assert_eq!(Side::Theirs.to_string(), "theirs");
    }
}
