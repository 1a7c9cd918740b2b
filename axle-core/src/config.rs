use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AxleError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base address of the ApiAxle API server, without the version prefix.
    #[serde(default = "default_address", alias = "url")]
    pub address: String,
    #[serde(default = "default_version_endpoint")]
    pub version_endpoint: String,
    /// Saving an already-persisted keyring issues `PUT keyring/{id}` instead
    /// of failing.  Off unless the server is known to accept keyring updates.
    #[serde(default)]
    pub allow_keyring_update: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            version_endpoint: default_version_endpoint(),
            allow_keyring_update: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AxleError::Config(e.to_string()))
    }

    /// Read the config at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AxleError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), address = %config.service.address, "loaded config");
        Ok(config)
    }
}

/// `$XDG_CONFIG_HOME/axle/config.toml`, or `~/.config/axle/config.toml`.
pub fn default_config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| {
            tracing::warn!("neither XDG_CONFIG_HOME nor HOME are set; using current directory for config");
            PathBuf::from(".")
        });
    base.join("axle").join("config.toml")
}

fn default_address() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_version_endpoint() -> String {
    crate::DEFAULT_VERSION_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}
