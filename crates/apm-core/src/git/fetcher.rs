//! Clone repositories and check out resolved revisions.

use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{AutotagOption, ErrorCode, FetchOptions, Oid, Repository};
use tracing::{debug, info};

use super::resolver::{Reference, RevisionResolver, resolve_local};
use super::RemoteOptions;
use crate::error::{Error, Result};

/// How a fetch should populate its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Fresh clone into an empty or missing destination.
    Clone,
    /// The destination already holds a clone of the same URL; only check
    /// out a different revision.
    SwitchOnly,
}

/// Populates a directory with a repository checked out at a version.
pub trait Fetcher {
    fn fetch(&self, url: &str, version: &str, dest: &Path, mode: FetchMode) -> Result<()>;
}

/// [`Fetcher`] backed by libgit2.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher {
    options: RemoteOptions,
    resolver: RevisionResolver,
}

impl GitFetcher {
    pub fn new(options: RemoteOptions) -> Self {
        Self {
            resolver: RevisionResolver::new(options.clone()),
            options,
        }
    }

    pub fn resolver(&self) -> &RevisionResolver {
        &self.resolver
    }

    /// Full-history clone with all tags, then check out `reference`.
    pub fn clone_at(&self, url: &str, reference: &Reference, dest: &Path) -> Result<Oid> {
        info!(url, reference = reference.name(), dest = %dest.display(), "cloning repository");

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.options.callbacks(url));
        fetch_options.download_tags(AutotagOption::All);

        let repo = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, dest)
            .map_err(|err| self.options.transport_error(url, err))?;

        let oid = match reference.oid() {
            Some(oid) => oid,
            None => resolve_local(&repo, reference.name()).map_err(|_| Error::Resolution {
                url: url.to_string(),
                version: reference.name().to_string(),
            })?,
        };
        checkout_commit(&repo, oid).map_err(|err| self.checkout_error(url, reference.name(), err))
    }

    /// Re-point an existing clone at `version` without touching the network.
    pub fn checkout(&self, dest: &Path, version: &str) -> Result<Oid> {
        let repo = Repository::open(dest).map_err(|err| {
            self.options.transport_error(&dest.display().to_string(), err)
        })?;
        let oid = resolve_local(&repo, version)?;
        debug!(dest = %dest.display(), version, commit = %oid, "switching checkout");
        checkout_commit(&repo, oid)
            .map_err(|err| self.checkout_error(&dest.display().to_string(), version, err))
    }

    /// A missing object means the version does not exist; anything else
    /// keeps its git error.
    fn checkout_error(&self, url: &str, version: &str, err: git2::Error) -> Error {
        if err.code() == ErrorCode::NotFound {
            return Error::Resolution {
                url: url.to_string(),
                version: version.to_string(),
            };
        }
        self.options.transport_error(url, err)
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, url: &str, version: &str, dest: &Path, mode: FetchMode) -> Result<()> {
        match mode {
            FetchMode::Clone => {
                let reference = self.resolver.resolve(url, version)?;
                self.clone_at(url, &reference, dest)?;
            }
            FetchMode::SwitchOnly => {
                self.checkout(dest, version)?;
            }
        }
        Ok(())
    }
}

/// Force-checkout the commit behind `oid` and detach HEAD onto it.
fn checkout_commit(repo: &Repository, oid: Oid) -> std::result::Result<Oid, git2::Error> {
    let commit = repo.find_object(oid, None)?.peel_to_commit()?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(commit.id())?;
    Ok(commit.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::ErrorClass;

    #[test]
    fn missing_object_on_checkout_is_resolution_error() {
        let err = GitFetcher::default().checkout_error(
            "file:///srv/roles",
            "v9.9",
            git2::Error::new(ErrorCode::NotFound, ErrorClass::Odb, "object not found"),
        );
        assert!(matches!(err, Error::Resolution { ref version, .. } if version == "v9.9"));
    }

    #[test]
    fn other_checkout_failures_keep_git_error() {
        let err = GitFetcher::default().checkout_error(
            "file:///srv/roles",
            "v1.0",
            git2::Error::new(ErrorCode::Locked, ErrorClass::Index, "index is locked"),
        );
        match err {
            Error::Transport { url, source } => {
                assert_eq!(url, "file:///srv/roles");
                assert_eq!(source.code(), ErrorCode::Locked);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
