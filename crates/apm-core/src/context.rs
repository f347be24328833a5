//! Application context shared by the front ends.

use std::path::{Path, PathBuf};

use crate::cache::ContentCache;
use crate::config::ApmConfig;
use crate::error::Result;
use crate::git::{Auth, CancelFlag, GitFetcher, RemoteOptions, RevisionResolver};
use crate::install::{BatchPolicy, InstallOptions, InstallOrchestrator};
use crate::link::LinkPlanner;
use crate::source::normalize_url;

/// Paths, credentials and behaviour flags for one invocation.
///
/// Front ends build this once from the config file and their flags, then
/// ask it for the services they need.
#[derive(Debug, Clone)]
pub struct AppContext {
    project_root: PathBuf,
    storage_root: PathBuf,
    auth: Auth,
    use_gitconfig: bool,
    once_download: bool,
    cancel: CancelFlag,
}

impl AppContext {
    pub fn new(project_root: PathBuf, storage_root: PathBuf) -> Self {
        Self {
            project_root,
            storage_root,
            auth: Auth::None,
            use_gitconfig: true,
            once_download: true,
            cancel: CancelFlag::new(),
        }
    }

    /// Context for `project_root` with settings taken from `config`.
    pub fn from_config(config: &ApmConfig, project_root: PathBuf) -> Result<Self> {
        Ok(Self {
            auth: config.auth()?,
            use_gitconfig: config.use_gitconfig,
            once_download: config.once_download,
            ..Self::new(project_root, config.storage_root()?)
        })
    }

    pub fn with_storage_root(mut self, storage_root: PathBuf) -> Self {
        self.storage_root = storage_root;
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_use_gitconfig(mut self, use_gitconfig: bool) -> Self {
        self.use_gitconfig = use_gitconfig;
        self
    }

    pub fn with_once_download(mut self, once_download: bool) -> Self {
        self.once_download = once_download;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Resolve a path given on the command line against the project root.
    pub fn project_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Normalize a package URL, applying git `insteadOf` rules if enabled.
    pub fn normalize_url(&self, raw: &str) -> Result<String> {
        normalize_url(raw, self.use_gitconfig)
    }

    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions::new(self.auth.clone(), self.cancel.clone())
    }

    pub fn resolver(&self) -> RevisionResolver {
        RevisionResolver::new(self.remote_options())
    }

    pub fn git_fetcher(&self) -> GitFetcher {
        GitFetcher::new(self.remote_options())
    }

    pub fn content_cache(&self) -> Result<ContentCache> {
        ContentCache::open(&self.storage_root)
    }

    pub fn link_planner(&self) -> LinkPlanner {
        LinkPlanner::new(&self.project_root)
    }

    pub fn orchestrator(&self) -> Result<InstallOrchestrator> {
        Ok(InstallOrchestrator::new(
            self.content_cache()?,
            Box::new(self.git_fetcher()),
            self.cancel.clone(),
        ))
    }

    pub fn install_options(&self, force: bool, policy: BatchPolicy) -> InstallOptions {
        InstallOptions {
            work_dir: self.project_root.clone(),
            force,
            once_download: self.once_download,
            policy,
        }
    }
}
