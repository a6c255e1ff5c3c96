//! Session registry data types.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::liveness::lenient_pid;

// ═══════════════════════════════════════════════════════════════════════════
// SESSION RECORD
// ═══════════════════════════════════════════════════════════════════════════

/// Whether a session is bound to the trunk working copy.
///
/// Persisted as the `is_main` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum SessionRole {
    Main,
    Worker,
}

impl From<bool> for SessionRole {
    fn from(is_main: bool) -> Self {
        if is_main {
            Self::Main
        } else {
            Self::Worker
        }
    }
}

impl From<SessionRole> for bool {
    fn from(role: SessionRole) -> Self {
        role == SessionRole::Main
    }
}

/// Informational classification of how a session relates to others.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ThreadType {
    #[default]
    Base,
    Parallel,
    Chained,
    Fusion,
    Big,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub path: PathBuf,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(rename = "is_main", default = "worker_role")]
    pub role: SessionRole,
    #[serde(default)]
    pub thread_type: ThreadType,
}

const fn worker_role() -> SessionRole {
    SessionRole::Worker
}

impl SessionRecord {
    pub fn is_main(&self) -> bool {
        self.role == SessionRole::Main
    }

    /// `Merge session <id> "<nickname>": <branch>`
    pub fn merge_message(&self) -> String {
        self.nickname.as_ref().map_or_else(
            || format!("Merge session {}: {}", self.id, self.branch),
            |nick| format!("Merge session {} \"{nick}\": {}", self.id, self.branch),
        )
    }

    /// Ids are decimal strings; sort numerically, junk last.
    pub(crate) fn sort_key(&self) -> (u64, String) {
        (self.id.parse().unwrap_or(u64::MAX), self.id.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTED DOCUMENTS
// ═══════════════════════════════════════════════════════════════════════════

/// `sessions.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionsDoc {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
}

const fn first_id() -> u64 {
    1
}

impl Default for SessionsDoc {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            project_name: None,
            sessions: BTreeMap::new(),
        }
    }
}

/// `pids/<id>.json`: proof that a worker process is running for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessToken {
    #[serde(default, with = "lenient_pid")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

// ═══════════════════════════════════════════════════════════════════════════
// OPERATION RESULTS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterOutcome {
    pub id: String,
    pub is_new: bool,
    pub is_main: bool,
    pub path: PathBuf,
    pub branch: String,
    pub thread_type: ThreadType,
}

/// A record plus the flags computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub active: bool,
    pub current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionView>,
    /// Dead liveness tokens swept while listing
    pub cleaned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub id: String,
    pub path: PathBuf,
    pub branch: String,
    pub branch_created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<SessionView>,
    pub total: usize,
    pub active: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub cleaned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullStatus {
    pub registration: RegisterOutcome,
    pub summary: Summary,
    pub sessions: Vec<SessionView>,
}

/// Outcome of one best-effort teardown step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum StepOutcome {
    Done,
    Skipped,
    Failed(String),
}

impl StepOutcome {
    pub fn from_result<T>(step: &str, result: crate::Result<T>) -> Self {
        match result {
            Ok(_) => Self::Done,
            Err(e) => {
                tracing::warn!("Cleanup step '{step}' failed: {e}");
                Self::Failed(e.to_string())
            }
        }
    }

    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub worktree: StepOutcome,
    pub touches: StepOutcome,
}
