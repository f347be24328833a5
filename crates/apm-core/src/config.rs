//! User configuration (`<config_dir>/apm/config.toml`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::DEFAULT_STORAGE;
use crate::error::{Error, Result};
use crate::fs::expand_home;
use crate::git::Auth;

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_PASSWORD_ENV: &str = "APM_PASSWORD";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    None,
    SshAgent,
    Basic,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub method: AuthMethod,
    pub username: Option<String>,
    /// Environment variable holding the password for `basic`.
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApmConfig {
    pub storage: Option<String>,
    pub use_gitconfig: bool,
    pub once_download: bool,
    pub auth: AuthConfig,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl Default for ApmConfig {
    fn default() -> Self {
        Self {
            storage: None,
            use_gitconfig: true,
            once_download: true,
            auth: AuthConfig::default(),
            source: None,
        }
    }
}

impl ApmConfig {
    /// `<config_dir>/apm/config.toml`, when a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("apm").join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|err| Error::Config {
            path: path.to_path_buf(),
            message: format!("Failed to read config file: {err}"),
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|err| err.to_string())?;
        if config.auth.method == AuthMethod::Basic && config.auth.username.is_none() {
            return Err("auth method 'basic' requires a username".to_string());
        }
        Ok(config)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Storage root with `~` expanded.
    pub fn storage_root(&self) -> Result<PathBuf> {
        expand_home(self.storage.as_deref().unwrap_or(DEFAULT_STORAGE))
    }

    /// Build git credentials, reading the password from the environment.
    pub fn auth(&self) -> Result<Auth> {
        self.auth_with(|name| std::env::var(name).ok())
    }

    fn auth_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Auth> {
        match self.auth.method {
            AuthMethod::None => Ok(Auth::None),
            AuthMethod::SshAgent => Ok(Auth::SshAgent),
            AuthMethod::Basic => {
                let username = self.auth.username.clone().ok_or_else(|| {
                    self.config_error("auth method 'basic' requires a username")
                })?;
                let var = self
                    .auth
                    .password_env
                    .as_deref()
                    .unwrap_or(DEFAULT_PASSWORD_ENV);
                let password = lookup(var).ok_or_else(|| {
                    self.config_error(format!("environment variable {var} is not set"))
                })?;
                Ok(Auth::Basic { username, password })
            }
        }
    }

    fn config_error(&self, message: impl Into<String>) -> Error {
        Error::Config {
            path: self.source.clone().unwrap_or_default(),
            message: message.into(),
        }
    }
}
