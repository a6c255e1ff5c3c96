//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/tandem/config.toml
//! 3. Project config: `<trunk>/.tandem/config.toml`
//! 4. Environment variables: TANDEM_*
//! 5. CLI flags (command-specific)
//!
//! # Example Config
//!
//! ```toml
//! worktree_dir = "../{repo}__worktrees"
//! main_branch = "main"
//!
//! [lease]
//! story_ttl_secs = 7200
//!
//! [merge]
//! default_strategy = "merge"
//! ```
//!
//! # Module Structure
//!
//! - `types`: Configuration structure definitions
//! - `defaults`: Default value implementations
//! - `load`: Loading from files and environment
//! - `merge`: Configuration merging logic
//! - `validate`: Validation and placeholder substitution

mod defaults;
mod load;
mod merge;
mod types;
mod validate;

#[cfg(test)]
mod tests_loading;
#[cfg(test)]
mod tests_validation;

pub use load::{global_config_path, load_config, load_config_from, load_toml_file, project_config_path};
pub use types::{BackendConfig, Config, LeaseConfig, LockConfig, MergeConfig};
