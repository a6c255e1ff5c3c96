//! Capped history of successful smart-merges (`merges.json`).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    merge::{FileCategory, ResolutionStrategy},
    store::{JsonDocument, LockOptions, Mutation},
    Result,
};

pub const DEFAULT_CAPACITY: usize = 50;

/// One conflicted path and how it was meant to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedResolution {
    pub path: String,
    pub category: FileCategory,
    pub strategy: ResolutionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeAttempt {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub files_to_resolve: Vec<PlannedResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files_auto_resolved: Vec<String>,
    #[serde(default)]
    pub commits_merged: u32,
}

impl MergeAttempt {
    pub fn begin(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            files_to_resolve: Vec::new(),
            merged_at: None,
            files_auto_resolved: Vec::new(),
            commits_merged: 0,
        }
    }

    pub fn finish(mut self, commits_merged: u32) -> Self {
        self.merged_at = Some(Utc::now());
        self.commits_merged = commits_merged;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeLog {
    #[serde(default)]
    pub merges: Vec<MergeAttempt>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    doc: JsonDocument<MergeLog>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, lock: LockOptions, capacity: usize) -> Self {
        Self {
            doc: JsonDocument::new(path, lock),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest beyond capacity.
    pub fn append(&self, entry: MergeAttempt) -> Result<()> {
        let capacity = self.capacity;
        let session_id = entry.session_id.clone();
        self.doc.transact(|log| {
            log.merges.push(entry.clone());
            let overflow = log.merges.len().saturating_sub(capacity);
            if overflow > 0 {
                log.merges = log.merges.split_off(overflow);
            }
            Ok(Mutation::Changed(()))
        })?;
        tracing::debug!("Recorded merge of session {session_id} in audit log");
        Ok(())
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Result<Vec<MergeAttempt>> {
        Ok(self.doc.load()?.merges)
    }
}
