//! # Tandem Core
//!
//! Coordination for several worker processes sharing one git repository,
//! each in its own worktree.
//!
//! ## Components
//!
//! - [`registry`]: stable session identities bound to working-copy paths
//! - [`lease`]: story claims and file touches with liveness and TTL validity
//! - [`merge`]: precondition checks, conflict classification and integration
//! - [`audit`]: capped history of successful smart-merges
//! - [`liveness`]: process existence probe behind a trait
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Shared JSON documents
//! are only ever changed through [`store::JsonDocument::transact`].

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod audit;
pub mod config;
pub mod context;
mod error;
pub mod json;
pub mod lease;
pub mod liveness;
pub mod merge;
pub mod registry;
pub mod store;
pub mod validation;
pub mod vcs;

pub use context::TandemContext;
pub use error::{Error, Precondition, Result};
