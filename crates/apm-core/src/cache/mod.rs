//! Content-addressed package cache.
//!
//! Each package identity `(url, path, version)` owns one directory named by
//! its fingerprint under the storage root. Entries hold the checked-out tree
//! without `.git` and are only replaced on a forced fetch.

mod key;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use key::{CacheKey, Fingerprint};

use crate::error::{Error, Result};
use crate::fs::{copy_tree_filtered, expand_home};
use crate::git::Fetcher;
use crate::install::InstallSession;
use crate::package::Package;

pub const DEFAULT_STORAGE: &str = "~/.apm";

/// A package available in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    pub fingerprint: Fingerprint,
    pub dir: PathBuf,
    /// Whether this call had to fetch the package.
    pub fetched: bool,
}

#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    /// Open (and create if needed) the cache at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| Error::storage(&root, err))?;
        Ok(Self { root })
    }

    /// Storage root used when nothing else is configured.
    pub fn default_root() -> Result<PathBuf> {
        expand_home(DEFAULT_STORAGE)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        fs::metadata(self.entry_dir(fingerprint))
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    /// Make sure `pkg` is in the cache and return its entry.
    ///
    /// Without `force`, an existing entry is returned as is and nothing is
    /// fetched. Otherwise the package is fetched into the session's staging
    /// checkout and copied over any previous entry.
    pub fn ensure_cached(
        &self,
        pkg: &Package,
        force: bool,
        session: &mut InstallSession,
        fetcher: &dyn Fetcher,
    ) -> Result<CachedPackage> {
        let fingerprint = pkg.cache_key().fingerprint();
        let dir = self.entry_dir(&fingerprint);

        if !force && self.contains(&fingerprint) {
            debug!(package = %pkg, %fingerprint, "cache hit");
            return Ok(CachedPackage {
                fingerprint,
                dir,
                fetched: false,
            });
        }

        let (checkout, mode) = session.prepare_checkout(&pkg.url)?;
        info!(package = %pkg, ?mode, "fetching package");
        if let Err(err) = fetcher.fetch(&pkg.url, &pkg.version, &checkout, mode) {
            session.discard_checkout()?;
            return Err(err);
        }
        session.record_clone(&pkg.url);

        self.store(&checkout, &fingerprint)?;
        debug!(package = %pkg, %fingerprint, dir = %dir.display(), "cached package");

        Ok(CachedPackage {
            fingerprint,
            dir,
            fetched: true,
        })
    }

    /// Copy a staged checkout into the entry for `fingerprint`, replacing
    /// whatever was there.
    fn store(&self, staged: &Path, fingerprint: &Fingerprint) -> Result<()> {
        let entry = self.entry_dir(fingerprint);
        let tmp = self
            .root
            .join(format!(".{}.tmp.{}", fingerprint, std::process::id()));

        if fs::symlink_metadata(&tmp).is_ok() {
            fs::remove_dir_all(&tmp).map_err(|err| Error::storage(&tmp, err))?;
        }
        fs::create_dir_all(&tmp).map_err(|err| Error::storage(&tmp, err))?;

        if let Err(err) = copy_tree_filtered(staged, &tmp, &[".git"]) {
            let _ = fs::remove_dir_all(&tmp);
            return Err(Error::storage(&tmp, err));
        }

        match fs::symlink_metadata(&entry) {
            Ok(meta) if meta.is_dir() => {
                fs::remove_dir_all(&entry).map_err(|err| Error::storage(&entry, err))?;
            }
            Ok(_) => fs::remove_file(&entry).map_err(|err| Error::storage(&entry, err))?,
            Err(_) => {}
        }
        fs::rename(&tmp, &entry).map_err(|err| Error::storage(&entry, err))?;
        Ok(())
    }
}
