//! Package identity and its filesystem-safe fingerprint.

use std::fmt;

/// Identity of a cached package: repository, subpath and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub url: String,
    pub path: String,
    pub version: String,
}

impl CacheKey {
    pub fn new(url: &str, path: &str, version: &str) -> Self {
        Self {
            url: url.to_string(),
            path: path.to_string(),
            version: version.to_string(),
        }
    }

    /// Compute the fingerprint used as the cache entry and hidden link name.
    ///
    /// Each field is length-prefixed so that no choice of separators inside
    /// a URL or path can make two different keys hash the same input.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        for field in [&self.url, &self.path, &self.version] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Fingerprint(hasher.finalize().to_hex().to_string())
    }
}

/// 64 lowercase hex characters, safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for Fingerprint {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}
