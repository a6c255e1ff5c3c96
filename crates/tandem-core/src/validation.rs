//! Identifier validation at the input boundary.
//!
//! Everything a user types that ends up in a git command line or a file name
//! passes through one of these checks first. They are pure: no I/O, same
//! input gives the same answer, and failures are [`Error::InvalidInput`].

use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

const MAX_BRANCH_LEN: usize = 100;
const MAX_NICKNAME_LEN: usize = 50;
const MAX_ITEM_ID_LEN: usize = 64;

// ============================================================================
// BRANCH NAMES
// ============================================================================

/// Validate a branch name before it reaches git.
///
/// # Validation Rules
///
/// - Starts with a letter or digit
/// - Letters, digits, `.`, `_`, `-` and `/` only (no spaces, no shell metacharacters)
/// - At most 100 characters
/// - No `..`, `//`, `@{`, and no trailing `/`, `.` or `.lock`
pub fn validate_branch_name(branch: &str) -> Result<()> {
    static BRANCH_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let branch_re = BRANCH_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]*$").ok());

    let reject = |reason: &str| Err(Error::invalid_input("branch", branch, reason));

    // Rule 1: Non-empty
    if branch.is_empty() {
        return reject("branch name cannot be empty");
    }

    // Rule 2: Maximum length
    if branch.len() > MAX_BRANCH_LEN {
        return reject("branch name must be at most 100 characters");
    }

    // Rule 3: Whitelisted characters
    if !branch_re.as_ref().is_some_and(|re| re.is_match(branch)) {
        return reject(
            "branch name must start with a letter or digit and contain only letters, digits, '.', '_', '-' or '/'",
        );
    }

    // Rule 4: Sequences git refuses in ref names
    if branch.contains("..") || branch.contains("//") {
        return reject("branch name cannot contain '..' or '//'");
    }
    if branch.ends_with('/') || branch.ends_with('.') || branch.ends_with(".lock") {
        return reject("branch name cannot end with '/', '.' or '.lock'");
    }

    Ok(())
}

// ============================================================================
// NICKNAMES
// ============================================================================

/// Validate a human-friendly session nickname.
///
/// Letters, digits, spaces, `_` and `-`; must start with a letter or digit;
/// at most 50 characters.
pub fn validate_nickname(nickname: &str) -> Result<()> {
    let reject = |reason: &str| Err(Error::invalid_input("nickname", nickname, reason));

    if nickname.trim().is_empty() {
        return reject("nickname cannot be empty");
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return reject("nickname must be at most 50 characters");
    }
    if !nickname
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return reject("nickname must start with a letter or digit");
    }
    if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
    {
        return reject("nickname must contain only letters, digits, spaces, '_' or '-'");
    }

    Ok(())
}

// ============================================================================
// WORK ITEMS AND SESSIONS
// ============================================================================

/// Validate a work-item id (`US-0001`, `bug_12`, `feat.login`).
pub fn validate_item_id(id: &str) -> Result<()> {
    let reject = |reason: &str| Err(Error::invalid_input("item", id, reason));

    if id.is_empty() {
        return reject("item id cannot be empty");
    }
    if id.len() > MAX_ITEM_ID_LEN {
        return reject("item id must be at most 64 characters");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return reject("item id must contain only letters, digits, '-', '_', '.' or ':'");
    }

    Ok(())
}

/// Session ids are decimal integers assigned by the registry.
pub fn validate_session_id(id: &str) -> Result<()> {
    if !id.is_empty() && id.len() <= 20 && id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::invalid_input(
            "session id",
            id,
            "session ids are positive integers",
        ))
    }
}
