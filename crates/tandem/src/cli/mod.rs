//! CLI utilities and helpers

pub mod commands;
pub mod handlers;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
pub use commands::build_cli;
use tandem_core::{
    lease::LeaseHolder,
    registry::{Registration, SessionRecord, ThreadType},
    Error, TandemContext,
};

/// Directory the command runs against.
pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to read the current directory")
}

#[cfg(unix)]
fn parent_pid() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn parent_pid() -> u32 {
    std::process::id()
}

/// `--pid`, or the process that invoked us (the worker's shell or agent).
pub fn caller_pid(sub_m: &ArgMatches) -> u32 {
    sub_m
        .try_get_one::<u32>("pid")
        .ok()
        .flatten()
        .copied()
        .unwrap_or_else(parent_pid)
}

pub fn thread_type(sub_m: &ArgMatches) -> Result<Option<ThreadType>> {
    sub_m
        .get_one::<String>("thread-type")
        .map(|value| {
            value
                .parse::<ThreadType>()
                .with_context(|| format!("Unknown thread type '{value}'"))
        })
        .transpose()
}

pub fn registration(cwd: &Path, sub_m: &ArgMatches) -> Result<Registration> {
    let mut request = Registration::new(cwd, caller_pid(sub_m));
    request.nickname = sub_m.get_one::<String>("nickname").cloned();
    request.thread_type = thread_type(sub_m)?;
    Ok(request)
}

/// The registered session owning the working copy that contains `cwd`.
pub async fn current_session(ctx: &TandemContext, cwd: &Path) -> Result<SessionRecord> {
    let root = ctx.backend.worktree_root(cwd).await?;
    let record = ctx
        .registry
        .find_by_path(&root)?
        .ok_or_else(|| Error::not_found("session", root.display().to_string()))?;
    Ok(record)
}

/// Lease holder for the current session. The pid is `--pid`, else the
/// session's registered live process, else the caller.
pub async fn current_holder(
    ctx: &TandemContext,
    cwd: &Path,
    sub_m: &ArgMatches,
) -> Result<LeaseHolder> {
    let record = current_session(ctx, cwd).await?;
    let explicit = sub_m.try_get_one::<u32>("pid").ok().flatten().copied();
    let pid = match explicit {
        Some(pid) => pid,
        None => ctx.registry.live_pid(&record.id)?.unwrap_or_else(parent_pid),
    };
    Ok(LeaseHolder::new(record.id, pid, record.path))
}
