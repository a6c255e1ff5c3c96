//! Inputs and reports for the merge coordinator.

use serde::Serialize;

use crate::{
    audit::PlannedResolution,
    error::Precondition,
    registry::StepOutcome,
    vcs::MergeStrategy,
};

/// Options shared by `integrate` and `smart_merge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    pub delete_branch: bool,
    pub delete_worktree: bool,
    /// Commit message; generated from the session record if absent
    pub message: Option<String>,
}

impl MergeOptions {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            delete_branch: true,
            delete_worktree: true,
            message: None,
        }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new(MergeStrategy::default())
    }
}

/// Read-only answer to "could this session be merged right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeCheck {
    pub session_id: String,
    pub branch: String,
    pub target: String,
    pub can_merge: bool,
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
    /// Every failed precondition, not just the first
    pub reasons: Vec<Precondition>,
}

/// What a smart-merge would have to resolve, computed from history alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePreview {
    pub session_id: String,
    pub branch: String,
    pub target: String,
    pub merge_base: String,
    pub ahead: u32,
    pub behind: u32,
    pub session_changes: Vec<String>,
    pub trunk_changes: Vec<String>,
    /// Paths changed on both sides, with the planned resolution
    pub candidates: Vec<PlannedResolution>,
}

/// Per-step result of post-merge teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub worktree: StepOutcome,
    pub branch: StepOutcome,
    pub touches: StepOutcome,
    pub session: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub session_id: String,
    pub branch: String,
    pub target: String,
    pub strategy: MergeStrategy,
    pub message: String,
    pub commits_merged: u32,
    /// Trunk HEAD after the merge commit, when it could be read
    pub commit: Option<String>,
    /// True when conflicts were resolved automatically
    pub auto_resolved: bool,
    pub resolved_files: Vec<String>,
    pub cleanup: CleanupReport,
}
