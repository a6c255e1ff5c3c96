//! Wiring: one fully assembled set of stores for a repository.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    audit::AuditLog,
    config::{load_config, Config},
    lease::{LeaseStore, StoryBoard, TouchTable},
    liveness::{LivenessOracle, ProcessProbe},
    merge::MergeCoordinator,
    registry::{RegistryPaths, SessionRegistry},
    vcs::{GitBackend, VcsBackend},
    Result,
};

/// Everything a command needs, rooted at one trunk working copy.
#[derive(Debug, Clone)]
pub struct TandemContext {
    pub config: Config,
    pub trunk_root: PathBuf,
    pub state_dir: PathBuf,
    pub backend: Arc<dyn VcsBackend>,
    pub oracle: Arc<dyn LivenessOracle>,
    pub registry: SessionRegistry,
    pub stories: LeaseStore<StoryBoard>,
    pub touches: LeaseStore<TouchTable>,
    pub merges: MergeCoordinator,
}

impl TandemContext {
    /// Locate the repository containing `cwd` and load its configuration.
    ///
    /// # Errors
    ///
    /// Returns error if git is missing, `cwd` is not inside a repository,
    /// or the configuration is invalid.
    pub async fn discover(cwd: &Path) -> Result<Self> {
        let git = GitBackend::detect(Config::default().backend_timeout())?;
        let trunk_root = git.trunk_root(cwd).await?;
        let config = load_config(&trunk_root)?;
        let backend = Arc::new(git.with_timeout(config.backend_timeout()));
        tracing::debug!("Discovered trunk at {}", trunk_root.display());

        Ok(Self::assemble(
            trunk_root,
            config,
            backend,
            Arc::new(ProcessProbe::new()),
        ))
    }

    /// Build every store from an already loaded configuration.
    pub fn assemble(
        trunk_root: PathBuf,
        config: Config,
        backend: Arc<dyn VcsBackend>,
        oracle: Arc<dyn LivenessOracle>,
    ) -> Self {
        let state_dir = config.state_path(&trunk_root);
        let lock = config.lock_options();

        let stories = LeaseStore::new(
            state_dir.join("stories.json"),
            lock,
            config.story_ttl(),
            Arc::clone(&oracle),
        );
        let touches = LeaseStore::new(
            state_dir.join("touches.json"),
            lock,
            config.touch_ttl(),
            Arc::clone(&oracle),
        );
        let registry = SessionRegistry::new(
            RegistryPaths {
                trunk_root: trunk_root.clone(),
                state_dir: state_dir.clone(),
                worktree_base: config.worktree_base(&trunk_root),
                main_branch: config.main_branch.clone(),
            },
            lock,
            Arc::clone(&oracle),
            Arc::clone(&backend),
            touches.clone(),
        );
        let audit = AuditLog::new(
            state_dir.join("merges.json"),
            lock,
            config.merge.audit_capacity,
        );
        let merges = MergeCoordinator::new(
            registry.clone(),
            Arc::clone(&backend),
            touches.clone(),
            audit,
            config.main_branch.clone(),
        );

        Self {
            config,
            trunk_root,
            state_dir,
            backend,
            oracle,
            registry,
            stories,
            touches,
            merges,
        }
    }

    pub const fn audit(&self) -> &AuditLog {
        self.merges.audit()
    }
}
