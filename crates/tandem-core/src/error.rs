//! Error types for Tandem with categorization:
//!
//! - **Input errors**: malformed names, bad configuration (exit code 1)
//! - **System errors**: IO, git invocations, timeouts (exit code 2)
//! - **Not found**: unknown sessions and work items (exit code 3)
//! - **State errors**: held leases, failed preconditions, partial merges (exit code 4)
//!
//! Every public operation returns [`Result`]; the CLI turns an [`Error`] into the
//! uniform `{"ok": false, "error": {...}}` envelope using [`Error::code`] and
//! [`Error::details`].

use std::fmt;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::lease::Lease;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an operation refused to run against the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Precondition {
    /// The main session is never merged into itself.
    CannotMergeMain,
    /// The main session is never deleted.
    CannotDeleteMain,
    /// The session's working copy has uncommitted changes.
    UncommittedChanges,
    /// The session's branch has no commits ahead of trunk.
    NoChangesToMerge,
    /// A plain integrate hit conflicts; use smart-merge instead.
    MergeConflicts { paths: Vec<String> },
    /// A main session already exists for another path.
    MainAlreadyBound { path: String },
    /// The trunk working copy is not on the configured main branch.
    TrunkNotOnMainBranch { expected: String, actual: String },
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotMergeMain => write!(f, "cannot merge the main session"),
            Self::CannotDeleteMain => write!(f, "cannot delete the main session"),
            Self::UncommittedChanges => {
                write!(f, "working copy has uncommitted changes; commit or stash them first")
            }
            Self::NoChangesToMerge => write!(f, "branch has no commits ahead of trunk"),
            Self::MergeConflicts { paths } => write!(
                f,
                "merge conflicts in {} file(s): {} (try smart-merge)",
                paths.len(),
                paths.join(", ")
            ),
            Self::MainAlreadyBound { path } => {
                write!(f, "main session is already bound to {path}")
            }
            Self::TrunkNotOnMainBranch { expected, actual } => {
                write!(f, "trunk is on branch '{actual}', expected '{expected}'")
            }
        }
    }
}

/// Top-level error type for every fallible Tandem operation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed or unsafe input, rejected before reaching the backend
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Unknown session, work item or lease
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Resource already validly leased by another holder
    #[error("{resource} is already held by session {} (pid {})", .lease.holder.session_id, .lease.holder.pid)]
    Conflict { resource: String, lease: Box<Lease> },

    /// Release or renew attempted on someone else's valid lease
    #[error("{resource} is held by session {}, not by the requester", .lease.holder.session_id)]
    NotOwner { resource: String, lease: Box<Lease> },

    /// Lease exists but is no longer valid; re-acquire it
    #[error("lease on {resource} held by session {} is stale", .lease.holder.session_id)]
    Stale { resource: String, lease: Box<Lease> },

    /// Current state does not allow the operation
    #[error("{resource}: {reason}")]
    PreconditionFailed {
        resource: String,
        reason: Precondition,
    },

    /// A git invocation failed
    #[error("{}", backend_message(.operation, .source_text, .is_not_found))]
    Backend {
        operation: String,
        source_text: String,
        is_not_found: bool,
    },

    /// A git invocation exceeded its time budget
    #[error("Backend operation '{operation}' timed out after {secs}s")]
    BackendTimeout { operation: String, secs: u64 },

    /// Smart-merge resolved some conflicts but not all; nothing was committed
    #[error(
        "session {session_id}: {} conflict(s) could not be auto-resolved: {}",
        .unresolved.len(),
        .unresolved.join(", ")
    )]
    PartialResolution {
        session_id: String,
        unresolved: Vec<String>,
        resolved: Vec<String>,
    },

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(String),

    /// Persisted document or command output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn backend_message(operation: &str, source: &str, is_not_found: &bool) -> String {
    if *is_not_found {
        format!(
            "Failed to {operation}: git is not installed or not in PATH\n\n\
             Install git and make sure it is on PATH: https://git-scm.com/downloads"
        )
    } else {
        format!("Failed to {operation}: {}", source.trim())
    }
}

// Convenience constructors
impl Error {
    pub fn invalid_input(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn precondition(resource: impl Into<String>, reason: Precondition) -> Self {
        Self::PreconditionFailed {
            resource: resource.into(),
            reason,
        }
    }

    pub fn backend(operation: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            source_text: source.into(),
            is_not_found: false,
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Machine-readable error code in `SCREAMING_SNAKE_CASE`.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotOwner { .. } => "NOT_OWNER",
            Self::Stale { .. } => "STALE",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Backend { .. } => "BACKEND_FAILURE",
            Self::BackendTimeout { .. } => "BACKEND_TIMEOUT",
            Self::PartialResolution { .. } => "PARTIAL_RESOLUTION",
            Self::Io(_) => "IO_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Returns the process exit code for this error.
    ///
    /// - 1: user error (invalid input, bad configuration)
    /// - 2: system error (IO, git, timeouts)
    /// - 3: not found
    /// - 4: invalid state (leases, preconditions, partial merges, corrupt documents)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput { .. } | Self::InvalidConfig(_) => 1,
            Self::Backend {
                is_not_found: true, ..
            }
            | Self::NotFound { .. } => 3,
            Self::Backend { .. } | Self::BackendTimeout { .. } | Self::Io(_) => 2,
            Self::Conflict { .. }
            | Self::NotOwner { .. }
            | Self::Stale { .. }
            | Self::PreconditionFailed { .. }
            | Self::PartialResolution { .. }
            | Self::Parse(_) => 4,
        }
    }

    /// Structured context for the JSON error envelope.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidInput { field, value, .. } => {
                Some(json!({ "field": field, "value": value }))
            }
            Self::NotFound { kind, id } => Some(json!({ "kind": kind, "id": id })),
            Self::Conflict { resource, lease }
            | Self::NotOwner { resource, lease }
            | Self::Stale { resource, lease } => {
                Some(json!({ "resource": resource, "holder": lease }))
            }
            Self::PreconditionFailed { resource, reason } => {
                Some(json!({ "resource": resource, "precondition": reason }))
            }
            Self::Backend { operation, .. } | Self::BackendTimeout { operation, .. } => {
                Some(json!({ "operation": operation }))
            }
            Self::PartialResolution {
                session_id,
                unresolved,
                resolved,
            } => Some(json!({
                "session_id": session_id,
                "unresolved": unresolved,
                "resolved": resolved,
            })),
            Self::Io(_) | Self::Parse(_) | Self::InvalidConfig(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io_error(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_config(format!("Failed to parse config: {err}"))
    }
}
