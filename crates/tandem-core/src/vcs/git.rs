//! `git` CLI backend.
//!
//! Every invocation runs through [`GitBackend::run`], which applies the
//! configured timeout and kills the child if the future is dropped. Failures
//! become [`Error::Backend`] carrying git's stderr.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    parse::{parse_ahead_behind, parse_name_list, parse_worktree_list, porcelain_is_dirty},
    AheadBehind, MergeStrategy, Side, TrialOutcome, VcsBackend,
};
use crate::{Error, Result};

/// Map a spawn failure to a backend error, flagging a missing `git`.
fn git_command_error(operation: &str, error: &std::io::Error) -> Error {
    Error::Backend {
        operation: operation.to_string(),
        source_text: error.to_string(),
        is_not_found: error.kind() == std::io::ErrorKind::NotFound,
    }
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).to_string()
    } else {
        stderr.to_string()
    }
}

/// Resolve a possibly relative path printed by git against `dir`.
fn resolve(dir: &Path, printed: &str) -> PathBuf {
    let path = dir.join(printed.trim());
    std::fs::canonicalize(&path).unwrap_or(path)
}

#[derive(Debug, Clone)]
pub struct GitBackend {
    program: PathBuf,
    timeout: Duration,
}

impl GitBackend {
    /// Locate `git` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns a not-found backend error when git is not installed.
    pub fn detect(timeout: Duration) -> Result<Self> {
        which::which("git")
            .map(|program| Self { program, timeout })
            .map_err(|e| Error::Backend {
                operation: "locate git".to_string(),
                source_text: e.to_string(),
                is_not_found: true,
            })
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run git in `dir` and return its raw output whatever the exit status.
    async fn run_raw(&self, dir: &Path, operation: &str, args: &[&str]) -> Result<Output> {
        tracing::debug!("git {} (in {})", args.join(" "), dir.display());

        let child = Command::new(&self.program)
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_MERGE_AUTOEDIT", "no")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| git_command_error(operation, &e))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| git_command_error(operation, &e)),
            Err(_) => Err(Error::BackendTimeout {
                operation: operation.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Run git in `dir`; a non-zero exit is an error. Returns stdout.
    async fn run(&self, dir: &Path, operation: &str, args: &[&str]) -> Result<String> {
        let output = self.run_raw(dir, operation, args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(Error::backend(operation, stderr_of(&output)))
        }
    }

    async fn merge_in_progress(&self, trunk: &Path) -> Result<bool> {
        let output = self
            .run_raw(
                trunk,
                "check merge state",
                &["rev-parse", "-q", "--verify", "MERGE_HEAD"],
            )
            .await?;
        Ok(output.status.success())
    }

    /// Start a merge without committing; returns the raw output.
    async fn begin_merge(
        &self,
        trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
    ) -> Result<Output> {
        let args: &[&str] = match strategy {
            MergeStrategy::Squash => &["merge", "--squash", branch],
            MergeStrategy::Merge => &["merge", "--no-commit", "--no-ff", branch],
        };
        self.run_raw(trunk, "start merge", args).await
    }
}

#[async_trait]
impl VcsBackend for GitBackend {
    async fn trunk_root(&self, cwd: &Path) -> Result<PathBuf> {
        let stdout = self
            .run(cwd, "find repository root", &["worktree", "list", "--porcelain"])
            .await?;
        parse_worktree_list(&stdout)
            .into_iter()
            .next()
            .map(|entry| std::fs::canonicalize(&entry.path).unwrap_or(entry.path))
            .ok_or_else(|| {
                Error::backend("find repository root", "git listed no working copies")
            })
    }

    async fn worktree_root(&self, cwd: &Path) -> Result<PathBuf> {
        let stdout = self
            .run(cwd, "find working copy root", &["rev-parse", "--show-toplevel"])
            .await?;
        Ok(resolve(cwd, &stdout))
    }

    async fn current_branch(&self, dir: &Path) -> Result<String> {
        let stdout = self
            .run(dir, "read current branch", &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn head_commit(&self, dir: &Path) -> Result<String> {
        let stdout = self
            .run(dir, "read HEAD commit", &["rev-parse", "HEAD"])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn branch_exists(&self, trunk: &Path, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{branch}");
        let output = self
            .run_raw(
                trunk,
                "check branch",
                &["show-ref", "--verify", "--quiet", reference.as_str()],
            )
            .await?;
        Ok(output.status.success())
    }

    async fn create_branch(&self, trunk: &Path, branch: &str, from: &str) -> Result<()> {
        self.run(trunk, "create branch", &["branch", branch, from])
            .await
            .map(|_| ())
    }

    async fn delete_branch(&self, trunk: &Path, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run(trunk, "delete branch", &["branch", flag, branch])
            .await
            .map(|_| ())
    }

    async fn add_worktree(&self, trunk: &Path, path: &Path, branch: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io_error(format!(
                    "Failed to create worktree directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let path = path.to_string_lossy();
        self.run(trunk, "create worktree", &["worktree", "add", &*path, branch])
            .await
            .map(|_| ())
    }

    async fn remove_worktree(&self, trunk: &Path, path: &Path, force: bool) -> Result<()> {
        let path = path.to_string_lossy();
        let args: &[&str] = if force {
            &["worktree", "remove", "--force", &*path]
        } else {
            &["worktree", "remove", &*path]
        };
        self.run(trunk, "remove worktree", args).await.map(|_| ())
    }

    async fn is_linked_worktree(&self, dir: &Path) -> Result<bool> {
        let stdout = self
            .run(
                dir,
                "inspect working copy",
                &["rev-parse", "--git-dir", "--git-common-dir"],
            )
            .await?;
        let mut lines = stdout.lines();
        match (lines.next(), lines.next()) {
            (Some(git_dir), Some(common_dir)) => {
                Ok(resolve(dir, git_dir) != resolve(dir, common_dir))
            }
            _ => Err(Error::parse_error(format!(
                "Unexpected rev-parse output: '{}'",
                stdout.trim()
            ))),
        }
    }

    async fn is_dirty(&self, dir: &Path) -> Result<bool> {
        let stdout = self
            .run(
                dir,
                "read working copy status",
                &["status", "--porcelain", "--untracked-files=no"],
            )
            .await?;
        Ok(porcelain_is_dirty(&stdout))
    }

    async fn merge_base(&self, trunk: &Path, a: &str, b: &str) -> Result<String> {
        let stdout = self.run(trunk, "find merge base", &["merge-base", a, b]).await?;
        Ok(stdout.trim().to_string())
    }

    async fn changed_paths(&self, trunk: &Path, from: &str, to: &str) -> Result<BTreeSet<String>> {
        let stdout = self
            .run(
                trunk,
                "list changed paths",
                &["diff", "--name-only", "--no-renames", from, to],
            )
            .await?;
        Ok(parse_name_list(&stdout))
    }

    async fn ahead_behind(&self, trunk: &Path, base: &str, branch: &str) -> Result<AheadBehind> {
        let range = format!("{base}...{branch}");
        let stdout = self
            .run(
                trunk,
                "count commits",
                &["rev-list", "--left-right", "--count", range.as_str()],
            )
            .await?;
        parse_ahead_behind(&stdout)
    }

    async fn trial_merge(&self, trunk: &Path, branch: &str) -> Result<TrialOutcome> {
        let output = self
            .run_raw(
                trunk,
                "trial merge",
                &["merge", "--no-commit", "--no-ff", branch],
            )
            .await?;

        let outcome = if output.status.success() {
            Ok(TrialOutcome::Clean)
        } else {
            match self.unmerged_paths(trunk).await {
                Ok(paths) if paths.is_empty() => {
                    Err(Error::backend("trial merge", stderr_of(&output)))
                }
                Ok(paths) => Ok(TrialOutcome::Conflicted(paths)),
                Err(e) => Err(e),
            }
        };

        // The trial never leaves anything behind, whatever it found.
        self.abort_merge(trunk).await?;
        outcome
    }

    async fn merge(
        &self,
        trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<()> {
        let result = match strategy {
            MergeStrategy::Squash => {
                let output = self.begin_merge(trunk, branch, strategy).await?;
                if output.status.success() {
                    self.commit(trunk, message).await
                } else {
                    Err(Error::backend("squash merge", stderr_of(&output)))
                }
            }
            MergeStrategy::Merge => self
                .run(trunk, "merge", &["merge", "--no-ff", "-m", message, branch])
                .await
                .map(|_| ()),
        };

        if result.is_err() {
            if let Err(e) = self.abort_merge(trunk).await {
                tracing::warn!("Failed to abort merge after error: {e}");
            }
        }
        result
    }

    async fn start_merge(
        &self,
        trunk: &Path,
        branch: &str,
        strategy: MergeStrategy,
    ) -> Result<Vec<String>> {
        let output = self.begin_merge(trunk, branch, strategy).await?;
        if output.status.success() {
            return Ok(Vec::new());
        }
        let paths = self.unmerged_paths(trunk).await?;
        if paths.is_empty() {
            self.abort_merge(trunk).await?;
            return Err(Error::backend("start merge", stderr_of(&output)));
        }
        Ok(paths)
    }

    async fn unmerged_paths(&self, trunk: &Path) -> Result<Vec<String>> {
        let stdout = self
            .run(
                trunk,
                "list unmerged paths",
                &["diff", "--name-only", "--diff-filter=U"],
            )
            .await?;
        Ok(parse_name_list(&stdout).into_iter().collect())
    }

    async fn checkout_side(&self, trunk: &Path, path: &str, side: Side) -> Result<()> {
        let flag = match side {
            Side::Ours => "--ours",
            Side::Theirs => "--theirs",
        };
        self.run(trunk, "check out conflict side", &["checkout", flag, "--", path])
            .await
            .map(|_| ())
    }

    async fn stage(&self, trunk: &Path, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let args: Vec<&str> = ["add", "--"]
            .into_iter()
            .chain(paths.iter().map(String::as_str))
            .collect();
        self.run(trunk, "stage files", &args).await.map(|_| ())
    }

    async fn commit(&self, trunk: &Path, message: &str) -> Result<()> {
        self.run(trunk, "commit", &["commit", "--no-verify", "-m", message])
            .await
            .map(|_| ())
    }

    async fn abort_merge(&self, trunk: &Path) -> Result<()> {
        // Squash merges leave no MERGE_HEAD, so `merge --abort` cannot undo them.
        let args: &[&str] = if self.merge_in_progress(trunk).await? {
            &["merge", "--abort"]
        } else {
            &["reset", "--merge"]
        };
        self.run(trunk, "abort merge", args).await.map(|_| ())
    }
}
