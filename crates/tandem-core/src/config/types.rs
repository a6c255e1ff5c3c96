//! Configuration type definitions
//!
//! Pure data holders; behaviour lives in the sibling modules.

use serde::{Deserialize, Serialize};

use crate::vcs::MergeStrategy;

// ═══════════════════════════════════════════════════════════════════════════
// MAIN CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════

/// Root configuration structure
///
/// Loaded from defaults → global → project → env vars → CLI flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Coordination state directory, relative to the trunk root
    pub state_dir: String,
    /// Where new worktrees go, relative to the trunk root; `{repo}` is the
    /// trunk directory name
    pub worktree_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_branch: Option<String>,
    pub lease: LeaseConfig,
    pub lock: LockConfig,
    pub merge: MergeConfig,
    pub backend: BackendConfig,
}

// ═══════════════════════════════════════════════════════════════════════════
// NESTED CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LeaseConfig {
    pub story_ttl_secs: u64,
    pub touch_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeConfig {
    pub default_strategy: MergeStrategy,
    pub audit_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub timeout_secs: u64,
}
