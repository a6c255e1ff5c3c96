//! Parsers for `git` plumbing output.

use std::{collections::BTreeSet, path::PathBuf};

use super::AheadBehind;
use crate::{Error, Result};

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<String>,
}

/// Parse `git worktree list --porcelain`. The first entry is the main
/// working copy.
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    output
        .split("\n\n")
        .filter_map(|block| {
            let mut path = None;
            let mut branch = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("worktree ") {
                    path = Some(PathBuf::from(value));
                } else if let Some(value) = line.strip_prefix("branch ") {
                    branch = Some(
                        value
                            .strip_prefix("refs/heads/")
                            .unwrap_or(value)
                            .to_string(),
                    );
                }
            }
            path.map(|path| WorktreeEntry { path, branch })
        })
        .collect()
}

/// One path per line, blank lines dropped, duplicates collapsed.
pub fn parse_name_list(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `git rev-list --left-right --count <base>...<branch>`
/// (`<behind>\t<ahead>`).
pub fn parse_ahead_behind(output: &str) -> Result<AheadBehind> {
    let mut counts = output.split_whitespace().map(str::parse::<u32>);
    match (counts.next(), counts.next(), counts.next()) {
        (Some(Ok(behind)), Some(Ok(ahead)), None) => Ok(AheadBehind { ahead, behind }),
        _ => Err(Error::parse_error(format!(
            "Unexpected rev-list count output: '{}'",
            output.trim()
        ))),
    }
}

/// `git status --porcelain` output lists something.
pub fn porcelain_is_dirty(output: &str) -> bool {
    output.lines().any(|line| !line.trim().is_empty())
}
