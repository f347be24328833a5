//! Requirements manifest (`requirements.yml`).
//!
//! Declares which mappings of which repositories a project needs. `apm add`
//! merges into it, `apm install` expands it into install packages.

mod types;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use types::{MappingKey, RequiredMapping, RequiredPackage};

use crate::error::{Error, Result};
use crate::package::Package;

pub const DEFAULT_MANIFEST: &str = "requirements.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub packages: Vec<RequiredPackage>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the manifest at `path`. A missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no requirements file, starting empty");
                return Ok(Self::new());
            }
            Err(err) => return Err(Error::storage(path, err)),
        };
        Self::read(file, Some(path))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Self::read(reader, None)
    }

    fn read(mut reader: impl Read, path: Option<&Path>) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content).map_err(|err| {
            Error::storage(path.map(Path::to_path_buf).unwrap_or_default(), err)
        })?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_yaml::from_str(&content).map_err(|source| Error::Manifest {
            path: path.map(Path::to_path_buf),
            source,
        })
    }

    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        serde_yaml::to_writer(writer, self).map_err(|source| Error::Manifest { path: None, source })
    }

    /// Save atomically (tmp + rename) next to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|source| Error::Manifest {
            path: Some(path.to_path_buf()),
            source,
        })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| Error::storage(&dir, err))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());
        let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

        fs::write(&tmp_path, content).map_err(|err| Error::storage(&tmp_path, err))?;
        if let Err(err) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::storage(path, err));
        }
        debug!(path = %path.display(), packages = self.packages.len(), "saved requirements");
        Ok(())
    }

    /// Merge `package` in: new URLs are appended, known URLs gain the new
    /// mappings, and a mapping with an existing `(src, dest)` only updates
    /// its version.
    pub fn add(&mut self, package: RequiredPackage) {
        match self.packages.iter_mut().find(|existing| existing.src == package.src) {
            Some(existing) => {
                for mapping in package.mappings {
                    existing.upsert(mapping);
                }
            }
            None => {
                let mut merged = RequiredPackage::new(package.src);
                for mapping in package.mappings {
                    merged.upsert(mapping);
                }
                self.packages.push(merged);
            }
        }
    }

    pub fn find_package(&self, url: &str) -> Option<&RequiredPackage> {
        self.packages.iter().find(|package| package.src == url)
    }

    pub fn find_mapping(&self, url: &str, key: &MappingKey) -> Option<&RequiredMapping> {
        self.find_package(url)?.find_mapping(key)
    }

    /// One install package per manifest mapping, see
    /// [`RequiredMapping::to_package`].
    pub fn packages_for_install(&self) -> Vec<Package> {
        self.packages
            .iter()
            .flat_map(|required| {
                required
                    .mappings
                    .iter()
                    .map(|mapping| mapping.to_package(&required.src))
            })
            .collect()
    }
}
