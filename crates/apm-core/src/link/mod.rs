//! Projection of cached packages into a working directory.
//!
//! Links go through one level of indirection:
//!
//! ```text
//! <work>/<dest>  ->  <work>/.apm/<fingerprint>  ->  <storage>/<fingerprint>
//! ```
//!
//! Every link target is stored as a relative path, so the project tree can
//! move as long as its offset to the storage root is unchanged (or the
//! storage root is on another drive, in which case the hidden link is
//! absolute).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::Fingerprint;
use crate::error::{Error, Result};
use crate::fs::{DEFAULT_EXCLUDES, is_glob, normalize_relative, relative_link_target, resolve_glob};
use crate::package::Package;

/// Hidden indirection directory inside the working directory.
pub const HIDDEN_DIR: &str = ".apm";

/// One symlink written (or confirmed) in the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    /// Link location relative to the working directory.
    pub path: PathBuf,
    /// Target stored in the link.
    pub target: PathBuf,
    /// False when the link already pointed at `target`.
    pub changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinkReport {
    pub hidden: Option<LinkOutcome>,
    pub links: Vec<LinkOutcome>,
}

impl LinkReport {
    pub fn changed(&self) -> bool {
        self.hidden.iter().chain(&self.links).any(|link| link.changed)
    }
}

#[derive(Debug, Clone)]
pub struct LinkPlanner {
    work_dir: PathBuf,
}

impl LinkPlanner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn hidden_dir(&self) -> PathBuf {
        self.work_dir.join(HIDDEN_DIR)
    }

    /// Location of the hidden entry for `fingerprint`, relative to the
    /// working directory.
    pub fn hidden_entry(fingerprint: &Fingerprint) -> PathBuf {
        Path::new(HIDDEN_DIR).join(fingerprint)
    }

    /// Point `.apm/<fingerprint>` at the cache entry.
    pub fn link_hidden(&self, fingerprint: &Fingerprint, cache_dir: &Path) -> Result<LinkOutcome> {
        let hidden_dir = self.hidden_dir();
        fs::create_dir_all(&hidden_dir).map_err(|err| Error::storage(&hidden_dir, err))?;

        let hidden_abs = fs::canonicalize(&hidden_dir).map_err(|err| Error::storage(&hidden_dir, err))?;
        let cache_abs = fs::canonicalize(cache_dir).map_err(|err| Error::storage(cache_dir, err))?;
        let target = relative_link_target(&hidden_abs, &cache_abs);

        let rel = Self::hidden_entry(fingerprint);
        let changed = make_link(&self.work_dir.join(&rel), &target, Error::storage)?;
        Ok(LinkOutcome {
            path: rel,
            target,
            changed,
        })
    }

    /// Link every mapping of `pkg` into the working directory.
    ///
    /// Mapping sources are resolved relative to `pkg.path`:
    /// - `.` or empty links the package root at `dest`
    /// - a glob links each match at `dest/<name>`
    /// - anything else links that sub-path at `dest`
    pub fn apply(
        &self,
        pkg: &Package,
        fingerprint: &Fingerprint,
        cache_dir: &Path,
    ) -> Result<LinkReport> {
        let hidden = self.link_hidden(fingerprint, cache_dir)?;
        let entry = Self::hidden_entry(fingerprint);
        let mut report = LinkReport {
            hidden: Some(hidden),
            links: Vec::new(),
        };

        for mapping in &pkg.mappings {
            let src = normalize_relative(&Path::new(&pkg.path).join(&mapping.src))?;
            let dest = normalize_relative(Path::new(&mapping.dest))?;

            if src.as_os_str().is_empty() {
                if dest.as_os_str().is_empty() {
                    return Err(Error::validation(
                        "cannot link a package root onto the working directory itself",
                    ));
                }
                report.links.push(self.link_one(&dest, &entry)?);
                continue;
            }

            let pattern = slash_path(&src);
            if is_glob(&pattern) {
                let root = self.work_dir.join(&entry);
                let matches = resolve_glob(&root, &pattern, DEFAULT_EXCLUDES)?;
                if matches.is_empty() {
                    warn!(package = %pkg, pattern = %pattern, "glob mapping matched nothing");
                }
                for matched in matches {
                    let Ok(inner) = matched.strip_prefix(&root) else {
                        continue;
                    };
                    let Some(name) = matched.file_name() else {
                        continue;
                    };
                    report
                        .links
                        .push(self.link_one(&dest.join(name), &entry.join(inner))?);
                }
            } else {
                let target = entry.join(&src);
                if fs::symlink_metadata(self.work_dir.join(&target)).is_err() {
                    warn!(package = %pkg, src = %src.display(), "mapped source does not exist in package");
                }
                report.links.push(self.link_one(&dest, &target)?);
            }
        }

        Ok(report)
    }

    /// Symlink work-relative `link` to work-relative `target`.
    fn link_one(&self, link: &Path, target: &Path) -> Result<LinkOutcome> {
        let link_dir = link.parent().unwrap_or(Path::new(""));
        let stored = relative_link_target(link_dir, target);
        let changed = make_link(&self.work_dir.join(link), &stored, Error::link)?;
        debug!(link = %link.display(), target = %stored.display(), changed, "linked");
        Ok(LinkOutcome {
            path: link.to_path_buf(),
            target: stored,
            changed,
        })
    }
}

/// Create or re-point the symlink at `link`.
///
/// An existing symlink is replaced; anything else at `link` is a conflict
/// and is left untouched. Returns whether the filesystem changed.
fn make_link(
    link: &Path,
    target: &Path,
    io_error: fn(PathBuf, io::Error) -> Error,
) -> Result<bool> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(link).is_ok_and(|current| current == target) {
                return Ok(false);
            }
            remove_symlink(link).map_err(|err| io_error(link.to_path_buf(), err))?;
        }
        Ok(_) => {
            return Err(Error::Conflict {
                path: link.to_path_buf(),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_error(link.to_path_buf(), err)),
    }

    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error(parent.to_path_buf(), err))?;
    }
    create_symlink(target, link).map_err(|err| io_error(link.to_path_buf(), err))?;
    Ok(true)
}

/// Render a relative path with `/` separators for glob matching.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link
        .parent()
        .map(|parent| parent.join(target))
        .unwrap_or_else(|| target.to_path_buf());
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Symlinks are not supported on this platform",
    ))
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> io::Result<()> {
    fs::remove_file(link).or_else(|_| fs::remove_dir(link))
}

#[cfg(not(windows))]
fn remove_symlink(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}
