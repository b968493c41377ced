//! Setup and configuration error types.
//!
//! Failures of individual requests are never reported through these types;
//! they are classified into [`netkit_core::NetworkingError`].

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for session construction and reconfiguration.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The TLS configuration was rejected.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    /// The default certificate verifier could not be built.
    #[error("Certificate verifier error: {0}")]
    Verifier(String),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] netkit_core::CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Pin Error
// ============================================================================

/// Error type for loading a pinned certificate.
#[derive(Debug, Error)]
pub enum PinError {
    /// The certificate file could not be read.
    #[error("Cannot read pinned certificate {}: {source}", .path.display())]
    Unreadable {
        /// Path of the certificate file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The bytes are not a DER encoded X.509 certificate.
    #[error("Malformed certificate: {0}")]
    Malformed(String),
}
