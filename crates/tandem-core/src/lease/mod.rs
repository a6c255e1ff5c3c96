//! Time- and liveness-bounded leases over named resources.
//!
//! A lease is **valid** while its holder process is alive *and* less than the
//! TTL has elapsed since it was acquired (or last refreshed). A dead holder
//! invalidates the lease immediately. Validity is computed on every read and
//! never persisted; [`LeaseStore::sweep_stale`] is the only operation that
//! deletes invalid leases.
//!
//! The store is generic over a [`LeaseTable`], the on-disk shape of one
//! namespace:
//!
//! - [`story::StoryBoard`]: one lease per work item, embedded as `claimed_by`
//! - [`touch::TouchTable`]: one lease per session carrying the set of files it
//!   has touched

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod story;
pub mod touch;

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    liveness::LivenessOracle,
    store::{JsonDocument, LockOptions, Mutation},
    Error, Result,
};

pub use story::{StoryBoard, WorkItem};
pub use touch::{Overlap, TouchEntry, TouchTable};

/// Who holds (or wants) a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseHolder {
    pub session_id: String,
    pub pid: u32,
    pub path: PathBuf,
}

impl LeaseHolder {
    pub fn new(session_id: impl Into<String>, pid: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            pid,
            path: path.into(),
        }
    }

    /// Two holders are the same party when they speak for the same session.
    pub fn same_party(&self, other: &Self) -> bool {
        self.session_id == other.session_id
    }
}

/// A lease as read from a namespace table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lease {
    pub key: String,
    #[serde(flatten)]
    pub holder: LeaseHolder,
    pub acquired_at: DateTime<Utc>,
}

/// Validity of the lease on one key, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "lease", rename_all = "lowercase")]
pub enum LeaseStatus {
    Free,
    Held(Lease),
    Stale(Lease),
}

/// Result of a successful [`LeaseStore::acquire`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acquired {
    pub lease: Lease,
    /// `false` when the requester already held a valid lease (no-op)
    pub newly_acquired: bool,
    /// Stale or force-displaced lease that was overwritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Lease>,
}

/// On-disk shape of one lease namespace.
pub trait LeaseTable: Serialize + DeserializeOwned + Default {
    /// Namespace label used in messages ("story", "touch set").
    const NAMESPACE: &'static str;

    /// Fails with `NotFound` when `key` cannot carry a lease at all.
    fn require(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn lease(&self, key: &str) -> Option<Lease>;

    fn leases(&self) -> Vec<Lease>;

    /// Store `lease`, replacing whatever lease `lease.key` had.
    fn grant(&mut self, lease: &Lease) -> Result<()>;

    /// Drop the lease on `key`; returns whether one existed.
    fn revoke(&mut self, key: &str) -> bool;
}

/// Lease operations over one namespace document.
#[derive(Debug, Clone)]
pub struct LeaseStore<T> {
    doc: JsonDocument<T>,
    ttl: chrono::Duration,
    oracle: Arc<dyn LivenessOracle>,
}

impl<T: LeaseTable> LeaseStore<T> {
    pub fn new(
        path: impl Into<PathBuf>,
        lock: LockOptions,
        ttl: std::time::Duration,
        oracle: Arc<dyn LivenessOracle>,
    ) -> Self {
        Self {
            doc: JsonDocument::new(path, lock),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            oracle,
        }
    }

    pub const fn document(&self) -> &JsonDocument<T> {
        &self.doc
    }

    pub const fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn resource(key: &str) -> String {
        format!("{} {key}", T::NAMESPACE)
    }

    /// Valid iff the holder is alive and the TTL has not elapsed.
    pub fn is_valid(&self, lease: &Lease, now: DateTime<Utc>) -> bool {
        self.oracle.is_alive(lease.holder.pid) && now.signed_duration_since(lease.acquired_at) < self.ttl
    }

    fn classify(&self, lease: Option<Lease>, now: DateTime<Utc>) -> LeaseStatus {
        match lease {
            None => LeaseStatus::Free,
            Some(lease) if self.is_valid(&lease, now) => LeaseStatus::Held(lease),
            Some(lease) => LeaseStatus::Stale(lease),
        }
    }

    pub fn status(&self, key: &str) -> Result<LeaseStatus> {
        let table = self.doc.load()?;
        table.require(key)?;
        Ok(self.classify(table.lease(key), Utc::now()))
    }

    /// Claim `key` for `holder`.
    ///
    /// - valid lease by another session: `Conflict` (unless `force`)
    /// - valid lease by the same session: no-op success
    /// - stale or absent lease: overwritten
    pub fn acquire(&self, key: &str, holder: &LeaseHolder, force: bool) -> Result<Acquired> {
        let acquired = self.doc.transact(|table| {
            table.require(key)?;
            let now = Utc::now();

            let previous = match self.classify(table.lease(key), now) {
                LeaseStatus::Held(current) if current.holder.same_party(holder) => {
                    return Ok(Mutation::Unchanged(Acquired {
                        lease: current,
                        newly_acquired: false,
                        previous: None,
                    }));
                }
                LeaseStatus::Held(current) if !force => {
                    return Err(Error::Conflict {
                        resource: Self::resource(key),
                        lease: Box::new(current),
                    });
                }
                LeaseStatus::Held(current) | LeaseStatus::Stale(current) => Some(current),
                LeaseStatus::Free => None,
            };

            let lease = Lease {
                key: key.to_string(),
                holder: holder.clone(),
                acquired_at: now,
            };
            table.grant(&lease)?;
            Ok(Mutation::Changed(Acquired {
                lease,
                newly_acquired: true,
                previous,
            }))
        })?;

        if acquired.newly_acquired {
            tracing::info!(
                "Session {} acquired {}",
                holder.session_id,
                Self::resource(key)
            );
        }
        Ok(acquired)
    }

    /// Give up `key`. Returns whether a lease was actually removed.
    ///
    /// Absent and stale leases release as a no-op success; a valid lease held
    /// by another session is `NotOwner`.
    pub fn release(&self, key: &str, holder: &LeaseHolder) -> Result<bool> {
        self.doc.transact(|table| {
            table.require(key)?;
            match self.classify(table.lease(key), Utc::now()) {
                LeaseStatus::Free | LeaseStatus::Stale(_) => Ok(Mutation::Unchanged(false)),
                LeaseStatus::Held(current) if !current.holder.same_party(holder) => {
                    Err(Error::NotOwner {
                        resource: Self::resource(key),
                        lease: Box::new(current),
                    })
                }
                LeaseStatus::Held(_) => Ok(Mutation::Changed(table.revoke(key))),
            }
        })
    }

    /// Restart the TTL of a lease the requester still validly holds.
    pub fn renew(&self, key: &str, holder: &LeaseHolder) -> Result<Lease> {
        self.doc.transact(|table| {
            table.require(key)?;
            let now = Utc::now();
            match self.classify(table.lease(key), now) {
                LeaseStatus::Free => Err(Error::not_found("lease", Self::resource(key))),
                LeaseStatus::Stale(current) => Err(Error::Stale {
                    resource: Self::resource(key),
                    lease: Box::new(current),
                }),
                LeaseStatus::Held(current) if !current.holder.same_party(holder) => {
                    Err(Error::NotOwner {
                        resource: Self::resource(key),
                        lease: Box::new(current),
                    })
                }
                LeaseStatus::Held(_) => {
                    let lease = Lease {
                        key: key.to_string(),
                        holder: holder.clone(),
                        acquired_at: now,
                    };
                    table.grant(&lease)?;
                    Ok(Mutation::Changed(lease))
                }
            }
        })
    }

    /// All currently valid leases, optionally only those of one session.
    pub fn list_valid(&self, session_id: Option<&str>) -> Result<Vec<Lease>> {
        let now = Utc::now();
        Ok(self
            .doc
            .load()?
            .leases()
            .into_iter()
            .filter(|lease| session_id.map_or(true, |id| lease.holder.session_id == id))
            .filter(|lease| self.is_valid(lease, now))
            .collect())
    }

    /// Delete every invalid lease and return what was removed.
    ///
    /// The document is only rewritten when something was actually stale.
    pub fn sweep_stale(&self) -> Result<Vec<Lease>> {
        let removed = self.doc.transact(|table| {
            let now = Utc::now();
            let stale: Vec<Lease> = table
                .leases()
                .into_iter()
                .filter(|lease| !self.is_valid(lease, now))
                .collect();
            for lease in &stale {
                table.revoke(&lease.key);
            }
            Ok(Mutation::changed_if(!stale.is_empty(), stale))
        })?;

        if !removed.is_empty() {
            tracing::info!("Swept {} stale {} lease(s)", removed.len(), T::NAMESPACE);
        }
        Ok(removed)
    }
}
