//! Per-batch install state.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};
use crate::git::{CancelFlag, FetchMode};

const STAGING_PREFIX: &str = "apm-";
const CHECKOUT_DIR: &str = "checkout";

/// State owned by one install run.
///
/// The staging directory is created before the first fetch and removed
/// when the session is dropped, whether the batch succeeded or not.
#[derive(Debug)]
pub struct InstallSession {
    staging: Option<TempDir>,
    cloned_url: Option<String>,
    reuse_clone: bool,
    cancel: CancelFlag,
}

impl InstallSession {
    /// `reuse_clone` lets a package switch the previous clone to another
    /// revision when it comes from the same URL.
    pub fn new(reuse_clone: bool, cancel: CancelFlag) -> Self {
        Self {
            staging: None,
            cloned_url: None,
            reuse_clone,
            cancel,
        }
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }

    /// Return the checkout directory to fetch `url` into and how to fetch it.
    pub fn prepare_checkout(&mut self, url: &str) -> Result<(PathBuf, FetchMode)> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let checkout = self.acquire()?.join(CHECKOUT_DIR);

        if self.reuse_clone && self.cloned_url.as_deref() == Some(url) && checkout.is_dir() {
            debug!(url, checkout = %checkout.display(), "reusing staged clone");
            return Ok((checkout, FetchMode::SwitchOnly));
        }

        self.discard_checkout()?;
        Ok((checkout, FetchMode::Clone))
    }

    /// Remember that the staging checkout now holds a clone of `url`.
    pub fn record_clone(&mut self, url: &str) {
        self.cloned_url = Some(url.to_string());
    }

    /// Throw away the staging checkout, if any.
    pub fn discard_checkout(&mut self) -> Result<()> {
        self.cloned_url = None;
        if let Some(staging) = &self.staging {
            let checkout = staging.path().join(CHECKOUT_DIR);
            if fs::symlink_metadata(&checkout).is_ok() {
                fs::remove_dir_all(&checkout).map_err(|err| Error::storage(&checkout, err))?;
            }
        }
        Ok(())
    }

    fn acquire(&mut self) -> Result<&Path> {
        let staging = match self.staging.take() {
            Some(staging) => staging,
            None => {
                let staging = tempfile::Builder::new()
                    .prefix(STAGING_PREFIX)
                    .tempdir()
                    .map_err(|err| Error::storage(std::env::temp_dir(), err))?;
                debug!(staging = %staging.path().display(), "created staging directory");
                staging
            }
        };
        Ok(self.staging.insert(staging).path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_is_lazy_and_removed_on_drop() {
        let mut session = InstallSession::new(true, CancelFlag::new());
        assert!(session.staging_dir().is_none());

        let (checkout, mode) = session.prepare_checkout("https://example.org/a").unwrap();
        assert_eq!(mode, FetchMode::Clone);
        let staging = session.staging_dir().unwrap().to_path_buf();
        assert!(checkout.starts_with(&staging));
        assert!(staging.is_dir());

        drop(session);
        assert!(!staging.exists());
    }

    #[test]
    fn same_url_switches_after_recorded_clone() {
        let mut session = InstallSession::new(true, CancelFlag::new());
        let (checkout, _) = session.prepare_checkout("https://example.org/a").unwrap();
        fs::create_dir_all(&checkout).unwrap();
        session.record_clone("https://example.org/a");

        let (_, mode) = session.prepare_checkout("https://example.org/a").unwrap();
        assert_eq!(mode, FetchMode::SwitchOnly);
    }

    #[test]
    fn other_url_clears_checkout() {
        let mut session = InstallSession::new(true, CancelFlag::new());
        let (checkout, _) = session.prepare_checkout("https://example.org/a").unwrap();
        fs::create_dir_all(&checkout).unwrap();
        fs::write(checkout.join("file"), "a").unwrap();
        session.record_clone("https://example.org/a");

        let (checkout, mode) = session.prepare_checkout("https://example.org/b").unwrap();
        assert_eq!(mode, FetchMode::Clone);
        assert!(!checkout.exists());
    }

    #[test]
    fn cancelled_session_refuses_to_prepare() {
        let cancel = CancelFlag::new();
        let mut session = InstallSession::new(false, cancel.clone());
        cancel.cancel();
        let err = session.prepare_checkout("https://example.org/a").unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
