//! Session settings.
//!
//! Settings are plain values; a [`crate::Session`] copies them on
//! construction and rebuilds its transport whenever they change.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default idle timeout, also the default whole request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration Kind
// ============================================================================

/// How the live transport treats shared state between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationKind {
    /// Cookies set by responses are kept and sent on later requests.
    #[default]
    Default,
    /// Nothing is shared between requests.
    Ephemeral,
}

impl ConfigurationKind {
    /// Returns true if responses may store cookies.
    pub fn keeps_cookies(self) -> bool {
        matches!(self, Self::Default)
    }
}

// ============================================================================
// Transport Settings
// ============================================================================

/// Settings the live transport is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Maximum idle time while waiting for data.
    pub request_timeout: Duration,
    /// Maximum total time for one request, body included.
    pub resource_timeout: Duration,
    /// Shared state policy.
    pub configuration: ConfigurationKind,
    /// Honour the `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` environment.
    pub system_proxy: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT,
            resource_timeout: DEFAULT_TIMEOUT,
            configuration: ConfigurationKind::Default,
            system_proxy: true,
        }
    }
}

// ============================================================================
// Session Settings
// ============================================================================

/// Everything a session is configured with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Live transport settings.
    pub transport: TransportSettings,
    /// DER certificate files whose public keys are pinned.
    pub pinned_certificates: Vec<PathBuf>,
    /// Accept every TLS peer, bypassing pinning and default verification.
    pub trust_all_peers: bool,
    /// Dump requests and responses through `tracing`.
    pub developer_mode: bool,
    /// Whether the test stub may be armed.
    pub allow_interception: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            pinned_certificates: Vec::new(),
            trust_all_peers: false,
            developer_mode: false,
            allow_interception: cfg!(debug_assertions),
        }
    }
}

impl SessionSettings {
    /// Sets both timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, request: Duration, resource: Duration) -> Self {
        self.transport.request_timeout = request;
        self.transport.resource_timeout = resource;
        self
    }

    /// Sets the configuration kind.
    #[must_use]
    pub fn with_configuration(mut self, configuration: ConfigurationKind) -> Self {
        self.transport.configuration = configuration;
        self
    }

    /// Enables or disables proxies taken from the environment.
    #[must_use]
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.transport.system_proxy = enabled;
        self
    }

    /// Sets the pinned certificate paths.
    #[must_use]
    pub fn with_pinned_certificates<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.pinned_certificates = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Accepts every TLS peer.
    #[must_use]
    pub fn with_trust_all_peers(mut self) -> Self {
        self.trust_all_peers = true;
        self
    }

    /// Enables developer mode dumps.
    #[must_use]
    pub fn with_developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// Allows or forbids arming the test stub.
    #[must_use]
    pub fn with_interception(mut self, allowed: bool) -> Self {
        self.allow_interception = allowed;
        self
    }
}
