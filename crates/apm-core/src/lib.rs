//! apm core library
//!
//! Fetches file-based packages from git repositories into a content-addressed
//! cache and links them into a project through a `.apm/` indirection layer.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod git;
pub mod install;
pub mod link;
pub mod manifest;
pub mod package;
pub mod source;

pub use error::{Error, Result};

/// Re-exports of commonly used types
pub mod prelude {
    pub use crate::cache::{CacheKey, CachedPackage, ContentCache, Fingerprint};
    pub use crate::config::ApmConfig;
    pub use crate::context::AppContext;
    pub use crate::error::{Error, Result};
    pub use crate::git::{Auth, CancelFlag, FetchMode, Fetcher, GitFetcher, RevisionResolver};
    pub use crate::install::{
        BatchPolicy, InstallOptions, InstallOrchestrator, InstallReport, InstallSession,
    };
    pub use crate::link::{LinkPlanner, LinkReport};
    pub use crate::manifest::{Manifest, MappingKey, RequiredMapping, RequiredPackage};
    pub use crate::package::{Mapping, Package};
}
