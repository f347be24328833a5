//! Path helpers for working-directory-relative destinations and link targets.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    let rest = if raw == "~" {
        ""
    } else if let Some(rest) = raw.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(raw));
    };
    let home = dirs::home_dir()
        .ok_or_else(|| Error::validation(format!("Cannot determine home directory for {raw}")))?;
    Ok(home.join(rest))
}

/// Lexically normalize a path that must stay inside its base directory.
///
/// `.` components are dropped and `..` pops the previous component. An
/// empty result means the base directory itself.
pub fn normalize_relative(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(Error::validation(format!(
                        "path escapes the working directory: {}",
                        path.display()
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(format!(
                    "absolute paths are not allowed: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}

/// Compute the target to store in a symlink placed in `link_dir` so that it
/// resolves to `target`. Falls back to `target` itself when no relative path
/// exists between the two (e.g. different drive prefixes).
pub fn relative_link_target(link_dir: &Path, target: &Path) -> PathBuf {
    match pathdiff::diff_paths(target, link_dir) {
        Some(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Some(rel) => rel,
        None => target.to_path_buf(),
    }
}
