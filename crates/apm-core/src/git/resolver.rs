//! Resolve version strings to git references.

use std::cmp::Ordering;

use git2::{Direction, Oid, Remote, Repository};
use tracing::debug;

use super::RemoteOptions;
use crate::error::{Error, Result};

/// A version string resolved against a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Branch { name: String, oid: Oid },
    Tag { name: String, oid: Oid },
    /// Not advertised by the remote; assumed to be a commit hash and
    /// checked when the repository is fetched.
    Hash(String),
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Reference::Branch { name, .. } | Reference::Tag { name, .. } => name,
            Reference::Hash(hash) => hash,
        }
    }

    pub fn oid(&self) -> Option<Oid> {
        match self {
            Reference::Branch { oid, .. } | Reference::Tag { oid, .. } => Some(*oid),
            Reference::Hash(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RevisionResolver {
    options: RemoteOptions,
}

impl RevisionResolver {
    pub fn new(options: RemoteOptions) -> Self {
        Self { options }
    }

    /// List branches and tags advertised by `url`, in advertisement order.
    pub fn list_references(&self, url: &str) -> Result<Vec<Reference>> {
        if self.options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut remote =
            Remote::create_detached(url).map_err(|err| self.options.transport_error(url, err))?;
        let connection = remote
            .connect_auth(Direction::Fetch, Some(self.options.callbacks(url)), None)
            .map_err(|err| self.options.transport_error(url, err))?;
        let heads = connection
            .list()
            .map_err(|err| self.options.transport_error(url, err))?;

        let mut references = Vec::new();
        for head in heads {
            let name = head.name();
            if name.ends_with("^{}") {
                continue;
            }
            if let Some(branch) = name.strip_prefix("refs/heads/") {
                references.push(Reference::Branch {
                    name: branch.to_string(),
                    oid: head.oid(),
                });
            } else if let Some(tag) = name.strip_prefix("refs/tags/") {
                references.push(Reference::Tag {
                    name: tag.to_string(),
                    oid: head.oid(),
                });
            }
        }
        debug!(url, count = references.len(), "listed remote references");
        Ok(references)
    }

    /// Resolve `version` to a branch or tag advertised by `url`, falling
    /// back to treating it as a commit hash.
    pub fn resolve(&self, url: &str, version: &str) -> Result<Reference> {
        let reference = self
            .list_references(url)?
            .into_iter()
            .find(|reference| reference.name() == version)
            .unwrap_or_else(|| Reference::Hash(version.to_string()));
        debug!(url, version, resolved = ?reference, "resolved version");
        Ok(reference)
    }

    /// Short names of every branch and tag, semantic versions first.
    pub fn list_versions(&self, url: &str) -> Result<Vec<String>> {
        let names = self
            .list_references(url)?
            .into_iter()
            .map(|reference| reference.name().to_string())
            .collect();
        Ok(sort_versions(names))
    }
}

/// Resolve `version` inside an already cloned repository: the literal
/// revision first, then the `origin/` remote-tracking branch.
pub fn resolve_local(repo: &Repository, version: &str) -> Result<Oid> {
    let candidates = [version.to_string(), format!("origin/{version}")];
    for candidate in &candidates {
        if let Ok(object) = repo.revparse_single(candidate)
            && let Ok(commit) = object.peel_to_commit()
        {
            debug!(version, revision = %candidate, commit = %commit.id(), "resolved local revision");
            return Ok(commit.id());
        }
    }
    Err(Error::Resolution {
        url: repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(str::to_string))
            .unwrap_or_else(|| repo.path().display().to_string()),
        version: version.to_string(),
    })
}

/// Order semantic versions (with or without a `v` prefix) ascending, then
/// everything else lexicographically. Duplicates are dropped.
pub fn sort_versions(mut names: Vec<String>) -> Vec<String> {
    names.sort_by(|a, b| match (parse_semver(a), parse_semver(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    names.dedup();
    names
}

/// Lenient parse: `v1.2` and `1` are read as `1.2.0` and `1.0.0`.
fn parse_semver(name: &str) -> Option<semver::Version> {
    let raw = name.strip_prefix('v').unwrap_or(name);
    [raw.to_string(), format!("{raw}.0"), format!("{raw}.0.0")]
        .iter()
        .find_map(|candidate| semver::Version::parse(candidate).ok())
}
