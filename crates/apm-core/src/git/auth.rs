//! Remote access options: authentication and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use git2::{Cred, RemoteCallbacks};

use crate::error::Error;

/// How to authenticate against a remote repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    #[default]
    None,
    SshAgent,
    Basic { username: String, password: String },
}

/// Shared flag polled by long-running git transfers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    pub auth: Auth,
    pub cancel: CancelFlag,
}

impl RemoteOptions {
    pub fn new(auth: Auth, cancel: CancelFlag) -> Self {
        Self { auth, cancel }
    }

    /// Auth to use for `url`. `ssh` URLs always go through the SSH agent.
    pub fn auth_for(&self, url: &str) -> Auth {
        if url.starts_with("ssh") {
            Auth::SshAgent
        } else {
            self.auth.clone()
        }
    }

    /// Build git callbacks carrying credentials and the cancel check.
    pub fn callbacks(&self, url: &str) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();

        let cancel = self.cancel.clone();
        callbacks.transfer_progress(move |_| !cancel.is_cancelled());

        let auth = self.auth_for(url);
        if auth != Auth::None {
            // libgit2 keeps asking while credentials are rejected.
            let mut attempts = 0u32;
            callbacks.credentials(move |_url, username_from_url, _allowed| {
                attempts += 1;
                if attempts > 1 {
                    return Err(git2::Error::from_str("authentication failed"));
                }
                match &auth {
                    Auth::SshAgent => Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")),
                    Auth::Basic { username, password } => {
                        Cred::userpass_plaintext(username, password)
                    }
                    Auth::None => Cred::default(),
                }
            });
        }

        callbacks
    }

    /// Map a git error, turning aborted transfers into [`Error::Cancelled`].
    pub fn transport_error(&self, url: &str, source: git2::Error) -> Error {
        if self.cancel.is_cancelled() {
            return Error::Cancelled;
        }
        Error::Transport {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_urls_default_to_agent() {
        let options = RemoteOptions::default();
        assert_eq!(options.auth_for("ssh://git@example.org/role.git"), Auth::SshAgent);
        assert_eq!(options.auth_for("https://example.org/role.git"), Auth::None);
    }

    #[test]
    fn ssh_urls_ignore_basic_auth() {
        let options = RemoteOptions::new(
            Auth::Basic {
                username: "deploy".to_string(),
                password: "secret".to_string(),
            },
            CancelFlag::new(),
        );
        assert_eq!(options.auth_for("ssh://example.org/role.git"), Auth::SshAgent);
        assert!(matches!(
            options.auth_for("https://example.org/role.git"),
            Auth::Basic { .. }
        ));
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn cancelled_errors_map_to_cancelled() {
        let options = RemoteOptions::default();
        options.cancel.cancel();
        let err = options.transport_error("file:///tmp/x", git2::Error::from_str("aborted"));
        assert!(matches!(err, Error::Cancelled));
    }
}
