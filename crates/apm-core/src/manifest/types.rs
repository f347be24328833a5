//! Requirements file entries.

use serde::{Deserialize, Serialize};

use crate::fs::is_glob;
use crate::package::{DEFAULT_PATH, DEFAULT_VERSION, Mapping, Package};

/// Identity of a mapping inside one required package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub src: String,
    pub dest: String,
}

impl MappingKey {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredMapping {
    pub src: String,
    pub dest: String,
    #[serde(default = "default_version")]
    pub version: String,
}

impl RequiredMapping {
    pub fn new(
        src: impl Into<String>,
        dest: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
            version: version.into(),
        }
    }

    pub fn key(&self) -> MappingKey {
        MappingKey::new(&self.src, &self.dest)
    }

    /// Install request for this mapping.
    ///
    /// A plain source is the package root and is linked whole at `dest`. A
    /// glob source is split at its first glob segment: the literal prefix is
    /// the package root and the rest is matched inside it.
    pub fn to_package(&self, url: &str) -> Package {
        let segments: Vec<&str> = self
            .src
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        let split = segments
            .iter()
            .position(|segment| is_glob(segment))
            .unwrap_or(segments.len());
        let path = match segments[..split].join("/") {
            root if root.is_empty() => DEFAULT_PATH.to_string(),
            root => root,
        };

        Package::new(url)
            .with_path(path)
            .with_version(&self.version)
            .with_mapping(Mapping::new(segments[split..].join("/"), &self.dest))
    }
}

/// All mappings required from one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredPackage {
    /// Repository URL.
    pub src: String,
    #[serde(default)]
    pub mappings: Vec<RequiredMapping>,
}

impl RequiredPackage {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mappings: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: RequiredMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn find_mapping(&self, key: &MappingKey) -> Option<&RequiredMapping> {
        self.mappings.iter().find(|mapping| mapping.key() == *key)
    }

    /// Insert `mapping`, overwriting the version of an existing mapping with
    /// the same key.
    pub(super) fn upsert(&mut self, mapping: RequiredMapping) {
        let key = mapping.key();
        match self.mappings.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => existing.version = mapping.version,
            None => self.mappings.push(mapping),
        }
    }
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}
