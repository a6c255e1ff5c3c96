//! Conflict-aware integration of session branches into trunk.
//!
//! Both entry points share the same phases:
//!
//! 1. Check preconditions (session exists, is not main, is clean, is ahead)
//! 2. Trial-merge to learn whether the branch applies cleanly
//! 3. Merge and commit on trunk
//! 4. Tear down the session (worktree, branch, touches, record)
//!
//! [`MergeCoordinator::integrate`] refuses conflicting branches.
//! [`MergeCoordinator::smart_merge`] resolves each conflicted path by its
//! [`FileCategory`] and either commits every resolution or aborts and leaves
//! trunk as it was.
//!
//! # Errors
//!
//! Precondition failures surface as [`Error::PreconditionFailed`]; a merge
//! with paths that could not be resolved surfaces as
//! [`Error::PartialResolution`] after the merge was aborted.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

mod classify;
mod types;

use std::{path::PathBuf, sync::Arc};

pub use classify::{categorize_file, FileCategory, ResolutionStrategy};
pub use types::{CleanupReport, MergeCheck, MergeOptions, MergePreview, MergeReport};

use crate::{
    audit::{AuditLog, MergeAttempt, PlannedResolution},
    error::Precondition,
    lease::{LeaseStore, TouchTable},
    registry::{SessionRecord, SessionRegistry, StepOutcome},
    vcs::{AheadBehind, TrialOutcome, VcsBackend},
    Error, Result,
};

/// Planned resolution for one path.
pub fn plan_resolution(path: &str) -> PlannedResolution {
    let category = categorize_file(path);
    PlannedResolution {
        path: path.to_string(),
        category,
        strategy: category.strategy(),
    }
}

/// A session that passed every precondition.
struct Mergeable {
    record: SessionRecord,
    target: String,
    counts: AheadBehind,
}

#[derive(Debug, Clone)]
pub struct MergeCoordinator {
    trunk_root: PathBuf,
    main_branch: Option<String>,
    backend: Arc<dyn VcsBackend>,
    registry: SessionRegistry,
    touches: LeaseStore<TouchTable>,
    audit: AuditLog,
}

impl MergeCoordinator {
    pub fn new(
        registry: SessionRegistry,
        backend: Arc<dyn VcsBackend>,
        touches: LeaseStore<TouchTable>,
        audit: AuditLog,
        main_branch: Option<String>,
    ) -> Self {
        Self {
            trunk_root: registry.trunk_root().clone(),
            main_branch,
            backend,
            registry,
            touches,
            audit,
        }
    }

    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PRECONDITIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// The branch merges land on: the configured main branch, or whatever
    /// trunk has checked out.
    async fn target_branch(&self) -> Result<(String, Option<Precondition>)> {
        let current = self.backend.current_branch(&self.trunk_root).await?;
        match &self.main_branch {
            Some(expected) if *expected != current => Ok((
                expected.clone(),
                Some(Precondition::TrunkNotOnMainBranch {
                    expected: expected.clone(),
                    actual: current,
                }),
            )),
            Some(expected) => Ok((expected.clone(), None)),
            None => Ok((current, None)),
        }
    }

    /// Evaluate every precondition without failing on the first one.
    pub async fn check_merge(&self, id: &str) -> Result<MergeCheck> {
        let record = self.registry.get(id)?;
        let (target, trunk_problem) = self.target_branch().await?;

        if record.is_main() {
            return Ok(MergeCheck {
                session_id: record.id,
                branch: record.branch,
                target,
                can_merge: false,
                dirty: false,
                ahead: 0,
                behind: 0,
                reasons: vec![Precondition::CannotMergeMain],
            });
        }

        let dirty = self.backend.is_dirty(&record.path).await?;
        let counts = self
            .backend
            .ahead_behind(&self.trunk_root, &target, &record.branch)
            .await?;

        let reasons: Vec<Precondition> = [
            trunk_problem,
            dirty.then_some(Precondition::UncommittedChanges),
            (counts.ahead == 0).then_some(Precondition::NoChangesToMerge),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(MergeCheck {
            session_id: record.id,
            branch: record.branch,
            target,
            can_merge: reasons.is_empty(),
            dirty,
            ahead: counts.ahead,
            behind: counts.behind,
            reasons,
        })
    }

    async fn require_mergeable(&self, id: &str) -> Result<Mergeable> {
        let record = self.registry.get(id)?;
        let resource = format!("session {id}");
        if record.is_main() {
            return Err(Error::precondition(resource, Precondition::CannotMergeMain));
        }

        let (target, trunk_problem) = self.target_branch().await?;
        if let Some(problem) = trunk_problem {
            return Err(Error::precondition("trunk", problem));
        }
        if self.backend.is_dirty(&record.path).await? {
            return Err(Error::precondition(
                resource,
                Precondition::UncommittedChanges,
            ));
        }
        let counts = self
            .backend
            .ahead_behind(&self.trunk_root, &target, &record.branch)
            .await?;
        if counts.ahead == 0 {
            return Err(Error::precondition(resource, Precondition::NoChangesToMerge));
        }

        Ok(Mergeable {
            record,
            target,
            counts,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PREVIEW
    // ═══════════════════════════════════════════════════════════════════════

    /// Paths changed on both sides since the merge base. Touches no files.
    pub async fn preview(&self, id: &str) -> Result<MergePreview> {
        let record = self.registry.get(id)?;
        if record.is_main() {
            return Err(Error::precondition(
                format!("session {id}"),
                Precondition::CannotMergeMain,
            ));
        }
        let (target, _) = self.target_branch().await?;
        let trunk = &self.trunk_root;

        let merge_base = self
            .backend
            .merge_base(trunk, &target, &record.branch)
            .await?;
        let counts = self
            .backend
            .ahead_behind(trunk, &target, &record.branch)
            .await?;
        let session_changes = self
            .backend
            .changed_paths(trunk, &merge_base, &record.branch)
            .await?;
        let trunk_changes = self
            .backend
            .changed_paths(trunk, &merge_base, &target)
            .await?;

        let candidates = session_changes
            .intersection(&trunk_changes)
            .map(|path| plan_resolution(path))
            .collect();

        Ok(MergePreview {
            session_id: record.id,
            branch: record.branch,
            target,
            merge_base,
            ahead: counts.ahead,
            behind: counts.behind,
            session_changes: session_changes.into_iter().collect(),
            trunk_changes: trunk_changes.into_iter().collect(),
            candidates,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MERGING
    // ═══════════════════════════════════════════════════════════════════════

    /// Merge a branch that applies cleanly. Conflicts are refused with the
    /// conflicting paths and trunk is left untouched.
    pub async fn integrate(&self, id: &str, options: &MergeOptions) -> Result<MergeReport> {
        let mergeable = self.require_mergeable(id).await?;
        let branch = mergeable.record.branch.clone();

        match self.backend.trial_merge(&self.trunk_root, &branch).await? {
            TrialOutcome::Clean => self.fast_path(mergeable, options).await,
            TrialOutcome::Conflicted(paths) => Err(Error::precondition(
                format!("session {id}"),
                Precondition::MergeConflicts { paths },
            )),
        }
    }

    /// Merge a branch, resolving conflicts per file category.
    ///
    /// A clean branch takes the same path as [`Self::integrate`]. Successful
    /// attempts are appended to the audit log.
    pub async fn smart_merge(&self, id: &str, options: &MergeOptions) -> Result<MergeReport> {
        let mergeable = self.require_mergeable(id).await?;
        let mut attempt = MergeAttempt::begin(id);
        let branch = mergeable.record.branch.clone();

        let report = match self.backend.trial_merge(&self.trunk_root, &branch).await? {
            TrialOutcome::Clean => self.fast_path(mergeable, options).await?,
            TrialOutcome::Conflicted(_) => {
                attempt.files_to_resolve = self.plan(&mergeable).await?;
                self.resolving_path(mergeable, options).await?
            }
        };

        attempt.files_auto_resolved.clone_from(&report.resolved_files);
        if let Err(e) = self.audit.append(attempt.finish(report.commits_merged)) {
            tracing::warn!("Failed to record merge of session {id} in audit log: {e}");
        }
        Ok(report)
    }

    async fn plan(&self, mergeable: &Mergeable) -> Result<Vec<PlannedResolution>> {
        let trunk = &self.trunk_root;
        let branch = &mergeable.record.branch;
        let base = self
            .backend
            .merge_base(trunk, &mergeable.target, branch)
            .await?;
        let ours = self
            .backend
            .changed_paths(trunk, &base, &mergeable.target)
            .await?;
        let theirs = self.backend.changed_paths(trunk, &base, branch).await?;
        Ok(ours
            .intersection(&theirs)
            .map(|path| plan_resolution(path))
            .collect())
    }

    async fn fast_path(&self, mergeable: Mergeable, options: &MergeOptions) -> Result<MergeReport> {
        let Mergeable {
            record,
            target,
            counts,
        } = mergeable;
        let message = options
            .message
            .clone()
            .unwrap_or_else(|| record.merge_message());

        self.backend
            .merge(&self.trunk_root, &record.branch, options.strategy, &message)
            .await?;
        tracing::info!("Merged session {} ({}) into {target}", record.id, record.branch);

        self.finish(record, target, counts, options, message, Vec::new())
            .await
    }

    async fn resolving_path(
        &self,
        mergeable: Mergeable,
        options: &MergeOptions,
    ) -> Result<MergeReport> {
        let Mergeable {
            record,
            target,
            counts,
        } = mergeable;
        let trunk = &self.trunk_root;

        // Phase 1: leave the merge in progress
        let conflicted = match self
            .backend
            .start_merge(trunk, &record.branch, options.strategy)
            .await
        {
            Ok(conflicted) => conflicted,
            Err(e) => {
                self.abort_quietly().await;
                return Err(e);
            }
        };

        // Phase 2: check out the planned side of every conflicted path
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();
        for path in conflicted {
            let side = categorize_file(&path).strategy().side();
            match self.backend.checkout_side(trunk, &path, side).await {
                Ok(()) => resolved.push(path),
                Err(e) => {
                    tracing::warn!("Could not resolve {path}: {e}");
                    unresolved.push(path);
                }
            }
        }
        if !unresolved.is_empty() {
            return Err(self.abandon(&record.id, unresolved, resolved).await);
        }

        // Phase 3: stage and confirm nothing is left unmerged
        if let Err(e) = self.backend.stage(trunk, &resolved).await {
            self.abort_quietly().await;
            return Err(e);
        }
        let remaining = match self.backend.unmerged_paths(trunk).await {
            Ok(remaining) => remaining,
            Err(e) => {
                self.abort_quietly().await;
                return Err(e);
            }
        };
        if !remaining.is_empty() {
            resolved.retain(|path| !remaining.contains(path));
            return Err(self.abandon(&record.id, remaining, resolved).await);
        }

        // Phase 4: commit
        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("{} (auto-resolved)", record.merge_message()));
        if let Err(e) = self.backend.commit(trunk, &message).await {
            self.abort_quietly().await;
            return Err(e);
        }
        tracing::info!(
            "Merged session {} ({}) into {target}, auto-resolved {} file(s)",
            record.id,
            record.branch,
            resolved.len()
        );

        self.finish(record, target, counts, options, message, resolved)
            .await
    }

    async fn abandon(
        &self,
        session_id: &str,
        unresolved: Vec<String>,
        resolved: Vec<String>,
    ) -> Error {
        self.abort_quietly().await;
        Error::PartialResolution {
            session_id: session_id.to_string(),
            unresolved,
            resolved,
        }
    }

    async fn abort_quietly(&self) {
        if let Err(e) = self.backend.abort_merge(&self.trunk_root).await {
            tracing::error!("Failed to abort merge in {}: {e}", self.trunk_root.display());
        }
    }

    async fn finish(
        &self,
        record: SessionRecord,
        target: String,
        counts: AheadBehind,
        options: &MergeOptions,
        message: String,
        resolved_files: Vec<String>,
    ) -> Result<MergeReport> {
        let commit = match self.backend.head_commit(&self.trunk_root).await {
            Ok(commit) => Some(commit),
            Err(e) => {
                tracing::warn!(
                    "Merged session {} but could not read trunk HEAD: {e}",
                    record.id
                );
                None
            }
        };
        let cleanup = self.cleanup(&record, options).await;

        Ok(MergeReport {
            session_id: record.id,
            branch: record.branch,
            target,
            strategy: options.strategy,
            message,
            commits_merged: counts.ahead,
            commit,
            auto_resolved: !resolved_files.is_empty(),
            resolved_files,
            cleanup,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CLEANUP
    // ═══════════════════════════════════════════════════════════════════════

    /// Best-effort teardown after a merge landed. Each step is attempted
    /// regardless of the others and reported individually.
    async fn cleanup(&self, record: &SessionRecord, options: &MergeOptions) -> CleanupReport {
        let trunk = &self.trunk_root;

        // The worktree goes first: git refuses to delete a checked-out branch.
        let worktree = if options.delete_worktree {
            StepOutcome::from_result(
                "remove worktree",
                self.backend.remove_worktree(trunk, &record.path, true).await,
            )
        } else {
            StepOutcome::Skipped
        };

        let branch = if options.delete_branch {
            let soft = self.backend.delete_branch(trunk, &record.branch, false).await;
            let result = match soft {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::debug!("Soft delete of {} refused ({e}), forcing", record.branch);
                    self.backend.delete_branch(trunk, &record.branch, true).await
                }
            };
            StepOutcome::from_result("delete branch", result)
        } else {
            StepOutcome::Skipped
        };

        let touches = StepOutcome::from_result("clear touches", self.touches.clear(&record.id));
        let session = StepOutcome::from_result("retire session", self.registry.retire(&record.id));

        CleanupReport {
            worktree,
            branch,
            touches,
            session,
        }
    }
}
