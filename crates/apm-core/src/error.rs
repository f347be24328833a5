//! Error taxonomy for the install engine.
//!
//! Every failure carries enough context (URL, version, path) to be reported
//! on its own. [`Error::is_batch_fatal`] tells the orchestrator which errors
//! must stop a batch regardless of the batch policy.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed package, mapping or location string.
    #[error("Invalid package: {message}")]
    Validation { message: String },

    /// The requested version does not name any reference or commit.
    #[error("Version '{version}' not found in {url}")]
    Resolution { url: String, version: String },

    /// Network, authentication or protocol failure talking to a remote.
    #[error("Git operation failed for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: git2::Error,
    },

    /// A mapping destination exists and is not a symlink.
    #[error("Destination already exists and is not a symlink: {}", path.display())]
    Conflict { path: PathBuf },

    /// Failed to create a destination link inside the working directory.
    #[error("Failed to link {}: {source}", path.display())]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache, hidden directory or staging area could not be written.
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requirements file could not be parsed or serialized.
    #[error("Requirements file error{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Manifest {
        path: Option<PathBuf>,
        #[source]
        source: serde_yaml::Error,
    },

    /// The user configuration file could not be parsed.
    #[error("Configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn link(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Link {
            path: path.into(),
            source,
        }
    }

    /// Errors that abort a batch even under the best-effort policy.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Cancelled)
    }
}
