//! Configuration file support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::settings::{ConfigurationKind, SessionSettings, TransportSettings};

/// Session configuration as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Whole request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub resource_timeout_secs: u64,
    /// Shared state policy.
    #[serde(default)]
    pub configuration: ConfigurationKind,
    /// DER certificate files to pin.
    #[serde(default)]
    pub pinned_certificates: Vec<PathBuf>,
    /// Accept every TLS peer.
    #[serde(default)]
    pub trust_all_peers: bool,
    /// Dump requests and responses.
    #[serde(default)]
    pub developer_mode: bool,
    /// Honour proxy environment variables.
    #[serde(default = "default_true")]
    pub system_proxy: bool,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            resource_timeout_secs: default_timeout_secs(),
            configuration: ConfigurationKind::Default,
            pinned_certificates: Vec::new(),
            trust_all_peers: false,
            developer_mode: false,
            system_proxy: true,
        }
    }
}

impl SessionConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netkit")
            .join("config.json")
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, FetchError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, FetchError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), FetchError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Converts the file contents into session settings.
    ///
    /// Relative pin paths are resolved against `base`, usually the directory
    /// holding the config file.
    pub fn into_settings(self, base: Option<&Path>) -> SessionSettings {
        let pinned_certificates = self
            .pinned_certificates
            .into_iter()
            .map(|path| match base {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            })
            .collect();

        SessionSettings {
            transport: TransportSettings {
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                resource_timeout: Duration::from_secs(self.resource_timeout_secs),
                configuration: self.configuration,
                system_proxy: self.system_proxy,
            },
            pinned_certificates,
            trust_all_peers: self.trust_all_peers,
            developer_mode: self.developer_mode,
            ..SessionSettings::default()
        }
    }
}
