//! Session registry: stable identities for worker processes.
//!
//! Sessions are keyed by the absolute path of their working copy. The first
//! registration from a path allocates the next id from a registry-wide
//! counter (ids are never reused); later registrations refresh the record.
//!
//! Liveness lives outside the registry document, in one small token file per
//! session (`pids/<id>.json`), so checking who is alive never rewrites the
//! registry.
//!
//! # Main session
//!
//! Exactly one session is bound to the trunk working copy. It is never
//! deleted or merged, and a second main with a different path is refused.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

mod types;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use itertools::Itertools;

pub use types::{
    CreateOutcome, DeleteOutcome, FullStatus, LivenessToken, RegisterOutcome, SessionList,
    SessionRecord, SessionRole, SessionView, SessionsDoc, StepOutcome, Summary, ThreadType,
};

use crate::{
    error::Precondition,
    lease::{LeaseStore, TouchTable},
    liveness::LivenessOracle,
    store::{JsonDocument, LockOptions, Mutation},
    validation,
    vcs::VcsBackend,
    Error, Result,
};

/// Canonical form of a working-copy path; falls back to the input when the
/// path does not exist.
pub(crate) fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Inputs to [`SessionRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    /// Any directory inside the working copy
    pub cwd: PathBuf,
    pub pid: u32,
    pub nickname: Option<String>,
    pub thread_type: Option<ThreadType>,
}

impl Registration {
    pub fn new(cwd: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            cwd: cwd.into(),
            pid,
            nickname: None,
            thread_type: None,
        }
    }
}

/// Where the registry lives and what it talks to.
#[derive(Debug, Clone)]
pub struct RegistryPaths {
    pub trunk_root: PathBuf,
    pub state_dir: PathBuf,
    pub worktree_base: PathBuf,
    pub main_branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    paths: RegistryPaths,
    lock: LockOptions,
    doc: JsonDocument<SessionsDoc>,
    oracle: Arc<dyn LivenessOracle>,
    backend: Arc<dyn VcsBackend>,
    touches: LeaseStore<TouchTable>,
}

impl SessionRegistry {
    pub fn new(
        paths: RegistryPaths,
        lock: LockOptions,
        oracle: Arc<dyn LivenessOracle>,
        backend: Arc<dyn VcsBackend>,
        touches: LeaseStore<TouchTable>,
    ) -> Self {
        let doc = JsonDocument::new(paths.state_dir.join("sessions.json"), lock);
        Self {
            paths,
            lock,
            doc,
            oracle,
            backend,
            touches,
        }
    }

    pub const fn trunk_root(&self) -> &PathBuf {
        &self.paths.trunk_root
    }

    pub const fn document(&self) -> &JsonDocument<SessionsDoc> {
        &self.doc
    }

    fn token_doc(&self, id: &str) -> JsonDocument<LivenessToken> {
        JsonDocument::new(
            self.paths.state_dir.join("pids").join(format!("{id}.json")),
            self.lock,
        )
    }

    fn pids_dir(&self) -> PathBuf {
        self.paths.state_dir.join("pids")
    }

    fn project_name(&self) -> Option<String> {
        self.paths
            .trunk_root
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIVENESS TOKENS
    // ═══════════════════════════════════════════════════════════════════════

    fn write_token(&self, id: &str, pid: u32) -> Result<()> {
        self.token_doc(id).transact(|token| {
            token.pid = Some(pid);
            token.started_at = Some(Utc::now());
            Ok(Mutation::Changed(()))
        })
    }

    fn remove_token(&self, id: &str) -> Result<()> {
        let doc = self.token_doc(id);
        for path in [doc.path().to_path_buf(), lock_file_for(doc.path())] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::io_error(format!(
                        "Failed to remove {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Ok(())
    }

    /// Live pid for a session, if its token exists and the process runs.
    pub fn live_pid(&self, id: &str) -> Result<Option<u32>> {
        Ok(self
            .token_doc(id)
            .load()?
            .pid
            .filter(|pid| self.oracle.is_alive(*pid)))
    }

    /// Delete every token whose process is gone. Returns how many were removed.
    fn sweep_tokens(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(self.pids_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io_error(format!("Failed to read pid directory: {e}"))),
        };

        let mut cleaned = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let alive = self
                .token_doc(id)
                .load()
                .ok()
                .and_then(|token| token.pid)
                .is_some_and(|pid| self.oracle.is_alive(pid));
            if !alive {
                self.remove_token(id)?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            tracing::info!("Removed {cleaned} dead liveness token(s)");
        }
        Ok(cleaned)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Create or refresh the record for the working copy containing
    /// `request.cwd` and write its liveness token.
    pub async fn register(&self, request: Registration) -> Result<RegisterOutcome> {
        if let Some(nickname) = &request.nickname {
            validation::validate_nickname(nickname)?;
        }

        let path = canonical(&self.backend.worktree_root(&request.cwd).await?);
        let branch = self.backend.current_branch(&path).await?;
        let role = if path == canonical(&self.paths.trunk_root) {
            SessionRole::Main
        } else {
            SessionRole::Worker
        };
        let linked = match role {
            SessionRole::Main => false,
            SessionRole::Worker => self.backend.is_linked_worktree(&path).await?,
        };
        let inferred = if linked {
            ThreadType::Parallel
        } else {
            ThreadType::Base
        };

        let project_name = self.project_name();
        let outcome = self.doc.transact(|doc| {
            let now = Utc::now();

            if let Some(record) = doc.sessions.values_mut().find(|r| r.path == path) {
                record.branch.clone_from(&branch);
                record.last_active = now;
                if let Some(nickname) = &request.nickname {
                    record.nickname = Some(nickname.clone());
                }
                if let Some(thread_type) = request.thread_type {
                    record.thread_type = thread_type;
                }
                return Ok(Mutation::Changed(RegisterOutcome {
                    id: record.id.clone(),
                    is_new: false,
                    is_main: record.is_main(),
                    path: record.path.clone(),
                    branch: record.branch.clone(),
                    thread_type: record.thread_type,
                }));
            }

            ensure_single_main(doc, role, &path)?;

            let id = doc.next_id.to_string();
            doc.next_id += 1;
            if doc.project_name.is_none() {
                doc.project_name.clone_from(&project_name);
            }
            let record = SessionRecord {
                id: id.clone(),
                path: path.clone(),
                branch: branch.clone(),
                nickname: request.nickname.clone(),
                created_at: now,
                last_active: now,
                role,
                thread_type: request.thread_type.unwrap_or(inferred),
            };
            let outcome = RegisterOutcome {
                id: id.clone(),
                is_new: true,
                is_main: record.is_main(),
                path: record.path.clone(),
                branch: record.branch.clone(),
                thread_type: record.thread_type,
            };
            doc.sessions.insert(id, record);
            Ok(Mutation::Changed(outcome))
        })?;

        self.write_token(&outcome.id, request.pid)?;

        if outcome.is_new {
            tracing::info!(
                "Registered session {} at {} (pid {})",
                outcome.id,
                outcome.path.display(),
                request.pid
            );
        }
        Ok(outcome)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    pub fn get(&self, id: &str) -> Result<SessionRecord> {
        validation::validate_session_id(id)?;
        self.doc
            .load()?
            .sessions
            .remove(id)
            .ok_or_else(|| Error::not_found("session", id))
    }

    pub fn find_by_path(&self, path: &Path) -> Result<Option<SessionRecord>> {
        let path = canonical(path);
        Ok(self
            .doc
            .load()?
            .sessions
            .into_values()
            .find(|record| record.path == path))
    }

    /// Record whose working copy contains `cwd` (deepest match wins).
    fn owner_of(records: &[SessionRecord], cwd: &Path) -> Option<String> {
        let cwd = canonical(cwd);
        records
            .iter()
            .filter(|record| cwd.starts_with(&record.path))
            .max_by_key(|record| record.path.components().count())
            .map(|record| record.id.clone())
    }

    /// All sessions with `active`/`current` computed; dead tokens are swept.
    pub fn list(&self, cwd: &Path) -> Result<SessionList> {
        let cleaned = self.sweep_tokens()?;
        let doc = self.doc.load()?;

        let records: Vec<SessionRecord> = doc
            .sessions
            .into_values()
            .sorted_by_key(SessionRecord::sort_key)
            .collect();
        let current = Self::owner_of(&records, cwd);

        let sessions = records
            .into_iter()
            .map(|record| {
                let pid = self.live_pid(&record.id)?;
                Ok(SessionView {
                    current: current.as_deref() == Some(record.id.as_str()),
                    active: pid.is_some(),
                    pid,
                    record,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SessionList { sessions, cleaned })
    }

    pub fn summary(&self, cwd: &Path) -> Result<Summary> {
        let project_name = self.doc.load()?.project_name;
        let list = self.list(cwd)?;
        Ok(summarize(&list, project_name))
    }

    /// Register the caller, then report on everyone.
    pub async fn full_status(&self, request: Registration) -> Result<FullStatus> {
        let cwd = request.cwd.clone();
        let registration = self.register(request).await?;
        let project_name = self.doc.load()?.project_name;
        let list = self.list(&cwd)?;
        Ok(FullStatus {
            registration,
            summary: summarize(&list, project_name),
            sessions: list.sessions,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WORKING COPIES
    // ═══════════════════════════════════════════════════════════════════════

    /// Branch + linked worktree + registry record for a new worker.
    ///
    /// No liveness token is written; the worker registers itself on start.
    pub async fn create_working_copy(
        &self,
        branch: &str,
        nickname: Option<&str>,
        thread_type: Option<ThreadType>,
    ) -> Result<CreateOutcome> {
        validation::validate_branch_name(branch)?;
        if let Some(nickname) = nickname {
            validation::validate_nickname(nickname)?;
        }

        let trunk = &self.paths.trunk_root;
        let path = self.paths.worktree_base.join(branch.replace('/', "-"));
        if path.exists() {
            return Err(Error::invalid_input(
                "branch",
                branch,
                format!("worktree path {} already exists", path.display()),
            ));
        }

        let branch_created = if self.backend.branch_exists(trunk, branch).await? {
            false
        } else {
            let base = match &self.paths.main_branch {
                Some(main) => main.clone(),
                None => self.backend.current_branch(trunk).await?,
            };
            self.backend.create_branch(trunk, branch, &base).await?;
            true
        };

        if let Err(e) = self.backend.add_worktree(trunk, &path, branch).await {
            if branch_created {
                if let Err(cleanup) = self.backend.delete_branch(trunk, branch, true).await {
                    tracing::warn!(
                        "Failed to delete branch {branch} after worktree error: {cleanup}"
                    );
                }
            }
            return Err(e);
        }
        let path = canonical(&path);

        let project_name = self.project_name();
        let id = self.doc.transact(|doc| {
            let now = Utc::now();
            let id = doc.next_id.to_string();
            doc.next_id += 1;
            if doc.project_name.is_none() {
                doc.project_name.clone_from(&project_name);
            }
            doc.sessions.insert(
                id.clone(),
                SessionRecord {
                    id: id.clone(),
                    path: path.clone(),
                    branch: branch.to_string(),
                    nickname: nickname.map(str::to_string),
                    created_at: now,
                    last_active: now,
                    role: SessionRole::Worker,
                    thread_type: thread_type.unwrap_or(ThreadType::Parallel),
                },
            );
            Ok(Mutation::Changed(id))
        })?;

        tracing::info!(
            "Created session {id} on branch {branch} at {}",
            path.display()
        );
        Ok(CreateOutcome {
            id,
            path,
            branch: branch.to_string(),
            branch_created,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REMOVAL
    // ═══════════════════════════════════════════════════════════════════════

    /// Remove a worker session. Teardown of the worktree and touch set is
    /// best-effort and reported; the record is removed regardless.
    pub async fn delete(&self, id: &str, remove_working_copy: bool) -> Result<DeleteOutcome> {
        let record = self.get(id)?;
        if record.is_main() {
            return Err(Error::precondition(
                format!("session {id}"),
                Precondition::CannotDeleteMain,
            ));
        }

        let worktree = if remove_working_copy {
            StepOutcome::from_result(
                "remove worktree",
                self.backend
                    .remove_worktree(&self.paths.trunk_root, &record.path, true)
                    .await,
            )
        } else {
            StepOutcome::Skipped
        };
        let touches = StepOutcome::from_result("clear touches", self.touches.clear(id));

        self.retire(id)?;
        tracing::info!("Deleted session {id}");

        Ok(DeleteOutcome {
            id: id.to_string(),
            worktree,
            touches,
        })
    }

    /// Drop a session's record and liveness token. Main is never retired.
    pub fn retire(&self, id: &str) -> Result<()> {
        self.doc.transact(|doc| match doc.sessions.get(id) {
            Some(record) if record.is_main() => Err(Error::precondition(
                format!("session {id}"),
                Precondition::CannotDeleteMain,
            )),
            Some(_) => {
                doc.sessions.remove(id);
                Ok(Mutation::Changed(()))
            }
            None => Ok(Mutation::Unchanged(())),
        })?;
        self.remove_token(id)
    }
}

/// A second main may only be bound at the path the first one already has.
fn ensure_single_main(doc: &SessionsDoc, role: SessionRole, path: &Path) -> Result<()> {
    if role != SessionRole::Main {
        return Ok(());
    }
    match doc
        .sessions
        .values()
        .find(|record| record.is_main() && record.path != path)
    {
        Some(existing) => Err(Error::precondition(
            "session registry",
            Precondition::MainAlreadyBound {
                path: existing.path.display().to_string(),
            },
        )),
        None => Ok(()),
    }
}

fn summarize(list: &SessionList, project_name: Option<String>) -> Summary {
    Summary {
        current: list.sessions.iter().find(|view| view.current).cloned(),
        total: list.sessions.len(),
        active: list.sessions.iter().filter(|view| view.active).count(),
        project_name,
        cleaned: list.cleaned,
    }
}

fn lock_file_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}
