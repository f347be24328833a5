//! Install request types.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::error::{Error, Result};
use crate::fs::normalize_relative;

pub const DEFAULT_VERSION: &str = "master";
pub const DEFAULT_PATH: &str = ".";

/// Maps a source pattern inside a package onto a destination path
/// relative to the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub src: String,
    pub dest: String,
}

impl Mapping {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }

    /// Mirror everything into the working directory root.
    pub fn mirror_all() -> Self {
        Self::new("*", ".")
    }
}

/// A package to install: a repository, the revision to check out, the
/// subpath that forms the package root, and where to link its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub url: String,
    pub version: String,
    pub path: String,
    pub mappings: Vec<Mapping>,
}

impl Package {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            version: String::new(),
            path: String::new(),
            mappings: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    /// Fill in defaults and reject packages that cannot be installed.
    pub fn validate(&mut self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::validation("package url is empty"));
        }
        if self.version.is_empty() {
            self.version = DEFAULT_VERSION.to_string();
        }
        if self.path.is_empty() {
            self.path = DEFAULT_PATH.to_string();
        }
        if self.mappings.is_empty() {
            self.mappings.push(Mapping::mirror_all());
        }
        for mapping in &self.mappings {
            if mapping.dest.is_empty() {
                return Err(Error::validation(format!(
                    "mapping '{}' has an empty destination",
                    mapping.src
                )));
            }
            let src = normalize_relative(&Path::new(&self.path).join(&mapping.src))?;
            let dest = normalize_relative(Path::new(&mapping.dest))?;
            if src.as_os_str().is_empty() && dest.as_os_str().is_empty() {
                return Err(Error::validation(
                    "cannot link a package root onto the working directory itself",
                ));
            }
        }
        Ok(())
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.url, &self.path, &self.version)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (path: {})", self.url, self.version, self.path)
    }
}
