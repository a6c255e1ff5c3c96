//! Shared fixtures for tandem-core integration tests.
//!
//! `FakeBackend` keeps an in-memory model of a repository with one trunk
//! and any number of linked worktrees. Tests script divergence, dirtiness
//! and conflicts directly instead of building real git history.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tandem_core::{
    config::Config,
    liveness::LivenessOracle,
    vcs::{AheadBehind, MergeStrategy, Side, TrialOutcome, VcsBackend},
    Error, Result, TandemContext,
};
use tempfile::TempDir;

// ═══════════════════════════════════════════════════════════════════════════
// LIVENESS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    alive: Mutex<HashSet<u32>>,
}

impl ScriptedOracle {
    pub fn with_alive(pids: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            alive: Mutex::new(pids.iter().copied().collect()),
        })
    }

    pub fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }

    pub fn spawn(&self, pid: u32) {
        self.alive.lock().unwrap().insert(pid);
    }
}

impl LivenessOracle for ScriptedOracle {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FAKE BACKEND
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct RepoModel {
    trunk: PathBuf,
    trunk_branch: String,
    branches: BTreeSet<String>,
    /// Linked worktree path -> checked-out branch
    worktrees: BTreeMap<PathBuf, String>,
    dirty: BTreeSet<PathBuf>,
    ahead: BTreeMap<String, u32>,
    behind: BTreeMap<String, u32>,
    session_changes: BTreeMap<String, BTreeSet<String>>,
    trunk_changes: BTreeSet<String>,
    conflicts: BTreeMap<String, Vec<String>>,
    failing_checkouts: BTreeSet<String>,
    merged: BTreeSet<String>,
    in_progress: Option<Vec<String>>,
    staged: BTreeSet<String>,
    resolutions: BTreeMap<String, Side>,
    commits: Vec<String>,
    aborts: usize,
    head_unreadable: bool,
    worktree_add_fails: bool,
}

impl RepoModel {
    fn unmerged(&self) -> Vec<String> {
        self.in_progress
            .iter()
            .flatten()
            .filter(|path| !self.staged.contains(*path))
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
pub struct FakeBackend {
    model: Mutex<RepoModel>,
}

fn fake_failure(operation: &str, message: impl Into<String>) -> Error {
    Error::backend(operation, message)
}

impl FakeBackend {
    pub fn new(trunk: &Path) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(RepoModel {
                trunk: trunk.to_path_buf(),
                trunk_branch: "main".to_string(),
                branches: BTreeSet::from(["main".to_string()]),
                ..RepoModel::default()
            }),
        })
    }

    pub fn set_dirty(&self, path: &Path, dirty: bool) {
        let mut model = self.model.lock().unwrap();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if dirty {
            model.dirty.insert(path);
        } else {
            model.dirty.remove(&path);
        }
    }

    /// Pretend `count` commits touching `files` landed on `branch`.
    pub fn commit_on_branch(&self, branch: &str, count: u32, files: &[&str]) {
        let mut model = self.model.lock().unwrap();
        *model.ahead.entry(branch.to_string()).or_default() += count;
        model
            .session_changes
            .entry(branch.to_string())
            .or_default()
            .extend(files.iter().map(|f| (*f).to_string()));
    }

    /// Pretend trunk moved on, touching `files`.
    pub fn commit_on_trunk(&self, branch_behind: &str, files: &[&str]) {
        let mut model = self.model.lock().unwrap();
        *model.behind.entry(branch_behind.to_string()).or_default() += 1;
        model
            .trunk_changes
            .extend(files.iter().map(|f| (*f).to_string()));
    }

    pub fn set_conflicts(&self, branch: &str, paths: &[&str]) {
        self.model.lock().unwrap().conflicts.insert(
            branch.to_string(),
            paths.iter().map(|p| (*p).to_string()).collect(),
        );
    }

    pub fn fail_checkout_of(&self, path: &str) {
        self.model
            .lock()
            .unwrap()
            .failing_checkouts
            .insert(path.to_string());
    }

    /// Make `head_commit` fail from now on.
    pub fn fail_head_commit(&self) {
        self.model.lock().unwrap().head_unreadable = true;
    }

    pub fn fail_worktree_add(&self) {
        self.model.lock().unwrap().worktree_add_fails = true;
    }

    pub fn set_trunk_branch(&self, branch: &str) {
        self.model.lock().unwrap().trunk_branch = branch.to_string();
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.model.lock().unwrap().branches.contains(branch)
    }

    pub fn has_worktree(&self, path: &Path) -> bool {
        self.model.lock().unwrap().worktrees.contains_key(path)
    }

    pub fn commits(&self) -> Vec<String> {
        self.model.lock().unwrap().commits.clone()
    }

    pub fn aborts(&self) -> usize {
        self.model.lock().unwrap().aborts
    }

    pub fn merge_in_progress(&self) -> bool {
        self.model.lock().unwrap().in_progress.is_some()
    }

    pub fn resolution_of(&self, path: &str) -> Option<Side> {
        self.model.lock().unwrap().resolutions.get(path).copied()
    }
}

#[async_trait]
impl VcsBackend for FakeBackend {
    async fn trunk_root(&self, cwd: &Path) -> Result<PathBuf> {
        let model = self.model.lock().unwrap();
        if cwd.starts_with(&model.trunk) || model.worktrees.keys().any(|w| cwd.starts_with(w)) {
            Ok(model.trunk.clone())
        } else {
            Err(fake_failure("find trunk", "not a git repository"))
        }
    }

    async fn worktree_root(&self, cwd: &Path) -> Result<PathBuf> {
        let model = self.model.lock().unwrap();
        let cwd = std::fs::canonicalize(cwd).unwrap_or_else(|_| cwd.to_path_buf());
        if let Some(path) = model.worktrees.keys().find(|w| cwd.starts_with(w)) {
            return Ok(path.clone());
        }
        if cwd.starts_with(&model.trunk) {
            Ok(model.trunk.clone())
        } else {
            Err(fake_failure("find worktree root", "not a git repository"))
        }
    }

    async fn current_branch(&self, dir: &Path) -> Result<String> {
        let model = self.model.lock().unwrap();
        Ok(model
            .worktrees
            .get(dir)
            .cloned()
            .unwrap_or_else(|| model.trunk_branch.clone()))
    }

    async fn head_commit(&self, _dir: &Path) -> Result<String> {
        let model = self.model.lock().unwrap();
        if model.head_unreadable {
            return Err(fake_failure("read HEAD", "bad object HEAD"));
        }
        Ok(format!("c{}", model.commits.len()))
    }

    async fn branch_exists(&self, _trunk: &Path, branch: &str) -> Result<bool> {
        Ok(self.model.lock().unwrap().branches.contains(branch))
    }

    async fn create_branch(&self, _trunk: &Path, branch: &str, from: &str) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if !model.branches.contains(from) {
            return Err(fake_failure("create branch", format!("unknown base {from}")));
        }
        model.branches.insert(branch.to_string());
        Ok(())
    }

    async fn delete_branch(&self, _trunk: &Path, branch: &str, force: bool) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if model.worktrees.values().any(|b| b == branch) {
            return Err(fake_failure("delete branch", "branch is checked out"));
        }
        if !force && !model.merged.contains(branch) {
            return Err(fake_failure("delete branch", "branch is not fully merged"));
        }
        if !model.branches.remove(branch) {
            return Err(fake_failure("delete branch", "branch not found"));
        }
        Ok(())
    }

    async fn add_worktree(&self, _trunk: &Path, path: &Path, branch: &str) -> Result<()> {
        if self.model.lock().unwrap().worktree_add_fails {
            return Err(fake_failure("add worktree", "could not create work tree dir"));
        }
        std::fs::create_dir_all(path)?;
        let path = std::fs::canonicalize(path)?;
        let mut model = self.model.lock().unwrap();
        if !model.branches.contains(branch) {
            return Err(fake_failure("add worktree", "invalid reference"));
        }
        model.worktrees.insert(path, branch.to_string());
        Ok(())
    }

    async fn remove_worktree(&self, _trunk: &Path, path: &Path, _force: bool) -> Result<()> {
        let removed = self.model.lock().unwrap().worktrees.remove(path);
        if removed.is_none() {
            return Err(fake_failure("remove worktree", "not a working tree"));
        }
        let _ = std::fs::remove_dir_all(path);
        Ok(())
    }

    async fn is_linked_worktree(&self, dir: &Path) -> Result<bool> {
        Ok(self.model.lock().unwrap().worktrees.contains_key(dir))
    }

    async fn is_dirty(&self, dir: &Path) -> Result<bool> {
        Ok(self.model.lock().unwrap().dirty.contains(dir))
    }

    async fn merge_base(&self, _trunk: &Path, _a: &str, _b: &str) -> Result<String> {
        Ok("base".to_string())
    }

    async fn changed_paths(&self, _trunk: &Path, _from: &str, to: &str) -> Result<BTreeSet<String>> {
        let model = self.model.lock().unwrap();
        if to == model.trunk_branch {
            Ok(model.trunk_changes.clone())
        } else {
            Ok(model.session_changes.get(to).cloned().unwrap_or_default())
        }
    }

    async fn ahead_behind(&self, _trunk: &Path, _base: &str, branch: &str) -> Result<AheadBehind> {
        let model = self.model.lock().unwrap();
        Ok(AheadBehind {
            ahead: model.ahead.get(branch).copied().unwrap_or(0),
            behind: model.behind.get(branch).copied().unwrap_or(0),
        })
    }

    async fn trial_merge(&self, _trunk: &Path, branch: &str) -> Result<TrialOutcome> {
        let model = self.model.lock().unwrap();
        match model.conflicts.get(branch) {
            Some(paths) if !paths.is_empty() => Ok(TrialOutcome::Conflicted(paths.clone())),
            _ => Ok(TrialOutcome::Clean),
        }
    }

    async fn merge(
        &self,
        _trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if model.conflicts.get(branch).is_some_and(|c| !c.is_empty()) {
            return Err(fake_failure("merge", "conflicts"));
        }
        model.commits.push(message.to_string());
        if strategy == MergeStrategy::Merge {
            model.merged.insert(branch.to_string());
        }
        Ok(())
    }

    async fn start_merge(
        &self,
        _trunk: &Path,
        branch: &str,
        _strategy: MergeStrategy,
    ) -> Result<Vec<String>> {
        let mut model = self.model.lock().unwrap();
        let conflicted = model.conflicts.get(branch).cloned().unwrap_or_default();
        model.in_progress = Some(conflicted.clone());
        model.staged.clear();
        Ok(conflicted)
    }

    async fn unmerged_paths(&self, _trunk: &Path) -> Result<Vec<String>> {
        Ok(self.model.lock().unwrap().unmerged())
    }

    async fn checkout_side(&self, _trunk: &Path, path: &str, side: Side) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if model.failing_checkouts.contains(path) {
            return Err(fake_failure("check out conflict side", "does not have our version"));
        }
        model.resolutions.insert(path.to_string(), side);
        Ok(())
    }

    async fn stage(&self, _trunk: &Path, paths: &[String]) -> Result<()> {
        self.model
            .lock()
            .unwrap()
            .staged
            .extend(paths.iter().cloned());
        Ok(())
    }

    async fn commit(&self, _trunk: &Path, message: &str) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        if !model.unmerged().is_empty() {
            return Err(fake_failure("commit", "unmerged paths"));
        }
        model.commits.push(message.to_string());
        model.in_progress = None;
        model.staged.clear();
        Ok(())
    }

    async fn abort_merge(&self, _trunk: &Path) -> Result<()> {
        let mut model = self.model.lock().unwrap();
        model.in_progress = None;
        model.staged.clear();
        model.resolutions.clear();
        model.aborts += 1;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════

/// A repository directory, a fake backend over it and an assembled context.
pub struct TestHarness {
    _temp_dir: TempDir,
    pub trunk: PathBuf,
    pub backend: Arc<FakeBackend>,
    pub oracle: Arc<ScriptedOracle>,
    pub ctx: TandemContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = std::fs::canonicalize(temp_dir.path()).unwrap();
        let trunk = root.join("demo");
        std::fs::create_dir_all(&trunk).unwrap();

        let config = Config {
            worktree_dir: root.join("worktrees").display().to_string(),
            ..config
        }
        .substitute_placeholders(&trunk);

        let backend = FakeBackend::new(&trunk);
        let oracle = ScriptedOracle::with_alive(&[]);
        let ctx = TandemContext::assemble(
            trunk.clone(),
            config,
            Arc::clone(&backend) as Arc<dyn tandem_core::vcs::VcsBackend>,
            Arc::clone(&oracle) as Arc<dyn LivenessOracle>,
        );

        Self {
            _temp_dir: temp_dir,
            trunk,
            backend,
            oracle,
            ctx,
        }
    }
}
