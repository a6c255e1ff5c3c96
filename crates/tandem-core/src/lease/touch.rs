//! File-touch leases: one lease per session over the set of files it edits.
//!
//! Touching is advisory. Two sessions may touch the same file; the point is
//! that each can ask who else is in there via [`LeaseStore::overlaps_for`].

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{Lease, LeaseHolder, LeaseStore, LeaseTable};
use crate::{liveness::lenient_pid, store::Mutation, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEntry {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, with = "lenient_pid")]
    pub pid: Option<u32>,
    pub path: PathBuf,
    pub last_updated: DateTime<Utc>,
}

/// The touch document (`touches.json`), keyed by session id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchTable {
    #[serde(default)]
    pub sessions: BTreeMap<String, TouchEntry>,
}

/// A touched path shared with other sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub path: String,
    pub other_holders: Vec<String>,
}

impl TouchEntry {
    fn lease(&self, session_id: &str) -> Lease {
        Lease {
            key: session_id.to_string(),
            holder: LeaseHolder::new(session_id, self.pid.unwrap_or(0), self.path.clone()),
            acquired_at: self.last_updated,
        }
    }
}

impl LeaseTable for TouchTable {
    const NAMESPACE: &'static str = "touch set";

    fn lease(&self, key: &str) -> Option<Lease> {
        self.sessions.get(key).map(|entry| entry.lease(key))
    }

    fn leases(&self) -> Vec<Lease> {
        self.sessions
            .iter()
            .map(|(session_id, entry)| entry.lease(session_id))
            .collect()
    }

    fn grant(&mut self, lease: &Lease) -> Result<()> {
        let files = self
            .sessions
            .remove(&lease.key)
            .map(|entry| entry.files)
            .unwrap_or_default();
        self.sessions.insert(
            lease.key.clone(),
            TouchEntry {
                files,
                pid: Some(lease.holder.pid),
                path: lease.holder.path.clone(),
                last_updated: lease.acquired_at,
            },
        );
        Ok(())
    }

    fn revoke(&mut self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }
}

/// Normalize a repository-relative path for comparison.
fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim().replace('\\', "/");
    let trimmed = trimmed.trim_start_matches("./");
    if trimmed.is_empty() {
        return Err(Error::invalid_input("path", path, "path cannot be empty"));
    }
    Ok(trimmed.to_string())
}

impl LeaseStore<TouchTable> {
    /// Add `paths` to the holder's touch set and refresh its lease.
    ///
    /// Returns the full set after the update.
    pub fn touch(&self, holder: &LeaseHolder, paths: &[String]) -> Result<Vec<String>> {
        let normalized: Vec<String> = paths
            .iter()
            .map(|p| normalize(p))
            .collect::<Result<_>>()?;

        let files = self.document().transact(|table| {
            let entry = table
                .sessions
                .entry(holder.session_id.clone())
                .or_insert_with(|| TouchEntry {
                    files: Vec::new(),
                    pid: Some(holder.pid),
                    path: holder.path.clone(),
                    last_updated: Utc::now(),
                });
            for path in &normalized {
                if !entry.files.contains(path) {
                    entry.files.push(path.clone());
                }
            }
            entry.pid = Some(holder.pid);
            entry.path.clone_from(&holder.path);
            entry.last_updated = Utc::now();
            Ok(Mutation::Changed(entry.files.clone()))
        })?;

        tracing::debug!(
            "Session {} touches {} file(s)",
            holder.session_id,
            files.len()
        );
        Ok(files)
    }

    /// Files currently recorded for one session, valid or not.
    pub fn files_for(&self, session_id: &str) -> Result<Vec<String>> {
        Ok(self
            .document()
            .load()?
            .sessions
            .remove(session_id)
            .map(|entry| entry.files)
            .unwrap_or_default())
    }

    /// For every path in the session's set, the other sessions with a valid
    /// touch lease on the same path.
    ///
    /// Empty when the session itself holds no valid lease or touched nothing.
    pub fn overlaps_for(&self, session_id: &str) -> Result<Vec<Overlap>> {
        let table = self.document().load()?;
        let now = Utc::now();

        let Some(own) = table.sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        if !self.is_valid(&own.lease(session_id), now) {
            return Ok(Vec::new());
        }

        let others: Vec<(&String, &TouchEntry)> = table
            .sessions
            .iter()
            .filter(|(id, _)| id.as_str() != session_id)
            .filter(|(id, entry)| self.is_valid(&entry.lease(id), now))
            .collect();

        Ok(own
            .files
            .iter()
            .filter_map(|path| {
                let other_holders = others
                    .iter()
                    .filter(|(_, entry)| entry.files.contains(path))
                    .map(|(id, _)| (*id).clone())
                    .sorted()
                    .collect_vec();
                (!other_holders.is_empty()).then(|| Overlap {
                    path: path.clone(),
                    other_holders,
                })
            })
            .collect())
    }

    /// Drop a session's touch set. Returns whether it had one.
    pub fn clear(&self, session_id: &str) -> Result<bool> {
        self.document().transact(|table| {
            let removed = table.sessions.remove(session_id).is_some();
            Ok(Mutation::changed_if(removed, removed))
        })
    }
}
