//! File-set resolution: glob matching over a package tree.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};

/// Version-control metadata never exposed through glob mappings.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Return every path under `root` matching `pattern`, minus any path with a
/// component matching one of `excludes`. Results are absolute (prefixed with
/// `root`) and sorted.
pub fn resolve_glob(root: &Path, pattern: &str, excludes: &[&str]) -> Result<Vec<PathBuf>> {
    let root_str = root.to_str().ok_or_else(|| {
        Error::validation(format!("Non UTF-8 path cannot be globbed: {}", root.display()))
    })?;
    let full = format!(
        "{}/{}",
        Pattern::escape(root_str.trim_end_matches('/')),
        pattern
    );

    let excludes = excludes
        .iter()
        .map(|raw| {
            Pattern::new(raw)
                .map_err(|err| Error::validation(format!("Invalid exclude pattern '{raw}': {err}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let entries = glob::glob_with(&full, MATCH_OPTIONS)
        .map_err(|err| Error::validation(format!("Invalid glob pattern '{pattern}': {err}")))?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| {
            let path = err.path().to_path_buf();
            Error::storage(path, err.into_error())
        })?;
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let excluded = rel.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            excludes
                .iter()
                .any(|pattern| pattern.matches_with(&name, MATCH_OPTIONS))
        });
        if !excluded {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

/// Whether a mapping source should be treated as a glob.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
