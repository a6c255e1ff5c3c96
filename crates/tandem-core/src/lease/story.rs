//! Story claims: leases embedded in the work-item document.
//!
//! The work-item list is shared with other tooling, so fields this crate does
//! not know about (on items and at the top level) are carried through
//! unchanged on every rewrite.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lease, LeaseHolder, LeaseStore, LeaseTable};
use crate::{liveness::lenient_pid, store::Mutation, validation, Error, Result};

/// `claimed_by` stamp on a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStamp {
    pub session_id: String,
    #[serde(default, with = "lenient_pid")]
    pub pid: Option<u32>,
    pub path: PathBuf,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<ClaimStamp>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            claimed_by: None,
            extra: serde_json::Map::new(),
        }
    }

    fn lease(&self) -> Option<Lease> {
        self.claimed_by.as_ref().map(|stamp| Lease {
            key: self.id.clone(),
            // A missing or junk pid reads as 0, which is never alive.
            holder: LeaseHolder::new(
                stamp.session_id.clone(),
                stamp.pid.unwrap_or(0),
                stamp.path.clone(),
            ),
            acquired_at: stamp.claimed_at,
        })
    }
}

/// The work-item document (`stories.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryBoard {
    #[serde(default)]
    pub stories: Vec<WorkItem>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoryBoard {
    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.stories.iter().find(|item| item.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut WorkItem> {
        self.stories.iter_mut().find(|item| item.id == id)
    }
}

impl LeaseTable for StoryBoard {
    const NAMESPACE: &'static str = "story";

    fn require(&self, key: &str) -> Result<()> {
        self.get(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("work item", key))
    }

    fn lease(&self, key: &str) -> Option<Lease> {
        self.get(key).and_then(WorkItem::lease)
    }

    fn leases(&self) -> Vec<Lease> {
        self.stories.iter().filter_map(WorkItem::lease).collect()
    }

    fn grant(&mut self, lease: &Lease) -> Result<()> {
        let item = self
            .get_mut(&lease.key)
            .ok_or_else(|| Error::not_found("work item", lease.key.clone()))?;
        item.claimed_by = Some(ClaimStamp {
            session_id: lease.holder.session_id.clone(),
            pid: Some(lease.holder.pid),
            path: lease.holder.path.clone(),
            claimed_at: lease.acquired_at,
        });
        Ok(())
    }

    fn revoke(&mut self, key: &str) -> bool {
        self.get_mut(key)
            .and_then(|item| item.claimed_by.take())
            .is_some()
    }
}

impl LeaseStore<StoryBoard> {
    /// Add a work item. Returns `false` when an item with that id already
    /// exists (its title is left as is).
    pub fn add_story(&self, id: &str, title: Option<&str>) -> Result<bool> {
        validation::validate_item_id(id)?;
        let added = self.document().transact(|board| {
            if board.get(id).is_some() {
                return Ok(Mutation::Unchanged(false));
            }
            board
                .stories
                .push(WorkItem::new(id, title.map(str::to_string)));
            Ok(Mutation::Changed(true))
        })?;
        if added {
            tracing::info!("Added work item {id}");
        }
        Ok(added)
    }

    pub fn stories(&self) -> Result<Vec<WorkItem>> {
        Ok(self.document().load()?.stories)
    }
}
