//! Trust evaluators for TLS server challenges.
//!
//! A [`TrustEvaluator`] decides, for one handshake, whether the peer's
//! certificate chain is acceptable. Two implementations exist:
//!
//! - [`PinningValidator`] accepts peers whose chain contains the public key
//!   of one of the locally pinned certificates.
//! - [`AlwaysTrustValidator`] accepts every peer.
//!
//! Pins compare public keys, not certificate bytes, so a server certificate
//! can be reissued with the same key without breaking pinned clients.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::digest::{SHA256, digest};
use rustls::pki_types::CertificateDer;
use tracing::{debug, warn};
use x509_parser::parse_x509_certificate;

use crate::error::PinError;

// ============================================================================
// Challenge & Disposition
// ============================================================================

/// Authentication method of a trust challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationMethod {
    /// The server presented its certificate chain.
    ServerTrust,
    /// The server asked the client for a certificate.
    ClientCertificate,
    /// Any other challenge.
    Other,
}

/// One trust decision to be made during a TLS handshake.
#[derive(Debug, Clone, Copy)]
pub struct TrustChallenge<'a> {
    /// Kind of challenge.
    pub method: AuthenticationMethod,
    /// Server name the client is connecting to.
    pub server_name: &'a str,
    /// Certificates offered by the peer, leaf first.
    pub chain: &'a [CertificateDer<'a>],
}

impl<'a> TrustChallenge<'a> {
    /// Creates a server trust challenge.
    pub fn server_trust(server_name: &'a str, chain: &'a [CertificateDer<'a>]) -> Self {
        Self {
            method: AuthenticationMethod::ServerTrust,
            server_name,
            chain,
        }
    }
}

/// Outcome of a trust evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDisposition {
    /// Accept the peer's credentials.
    UseCredential,
    /// Cancel the handshake.
    CancelChallenge,
    /// Let the platform's default verification decide.
    PerformDefaultHandling,
}

/// Decides whether a TLS peer is trusted.
pub trait TrustEvaluator: Send + Sync + fmt::Debug {
    /// Evaluates one challenge.
    fn evaluate(&self, challenge: &TrustChallenge<'_>) -> TrustDisposition;

    /// Returns a short name for logging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Pinned Certificate
// ============================================================================

/// The public key of a pinned certificate.
///
/// Holds the DER encoded `SubjectPublicKeyInfo`; equality is key equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PinnedCertificate {
    spki: Vec<u8>,
}

impl PinnedCertificate {
    /// Extracts the public key from a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, PinError> {
        let (_, certificate) =
            parse_x509_certificate(der).map_err(|e| PinError::Malformed(e.to_string()))?;
        Ok(Self {
            spki: certificate.public_key().raw.to_vec(),
        })
    }

    /// Loads a DER encoded certificate file and extracts its public key.
    pub fn load(path: &Path) -> Result<Self, PinError> {
        let der = std::fs::read(path).map_err(|source| PinError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_der(&der)
    }

    /// Returns the DER encoded `SubjectPublicKeyInfo`.
    pub fn public_key_der(&self) -> &[u8] {
        &self.spki
    }

    /// Returns the key fingerprint as `sha256/<base64>`.
    pub fn fingerprint(&self) -> String {
        format!("sha256/{}", STANDARD.encode(digest(&SHA256, &self.spki)))
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PinnedCertificate")
            .field(&self.fingerprint())
            .finish()
    }
}

impl fmt::Display for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Collects the public keys of every certificate in the chain.
///
/// Returns `None` when the chain cannot be evaluated: it is empty or the
/// leaf does not parse. Unparsable intermediates are skipped.
fn server_public_keys(chain: &[CertificateDer<'_>]) -> Option<HashSet<PinnedCertificate>> {
    let (leaf, intermediates) = chain.split_first()?;
    let mut keys = HashSet::with_capacity(chain.len());
    keys.insert(PinnedCertificate::from_der(leaf).ok()?);
    keys.extend(
        intermediates
            .iter()
            .filter_map(|cert| PinnedCertificate::from_der(cert).ok()),
    );
    Some(keys)
}

// ============================================================================
// Pinning Validator
// ============================================================================

/// Accepts peers whose chain contains a pinned public key.
///
/// Pin files are read on every evaluation, so replacing a file on disk takes
/// effect on the next handshake. With no pins configured the validator defers
/// to default handling.
#[derive(Debug, Clone, Default)]
pub struct PinningValidator {
    pins: Vec<PathBuf>,
}

impl PinningValidator {
    /// Creates a validator for the given certificate paths.
    pub fn new(pins: Vec<PathBuf>) -> Self {
        Self { pins }
    }

    /// Returns the configured certificate paths.
    pub fn pins(&self) -> &[PathBuf] {
        &self.pins
    }
}

impl TrustEvaluator for PinningValidator {
    fn evaluate(&self, challenge: &TrustChallenge<'_>) -> TrustDisposition {
        if challenge.method != AuthenticationMethod::ServerTrust {
            debug!(method = ?challenge.method, "Not a server trust challenge, cancelling");
            return TrustDisposition::CancelChallenge;
        }

        let Some(server_keys) = server_public_keys(challenge.chain) else {
            warn!(server = %challenge.server_name, "Server chain cannot be evaluated, cancelling");
            return TrustDisposition::CancelChallenge;
        };

        for path in &self.pins {
            match PinnedCertificate::load(path) {
                Ok(pin) if server_keys.contains(&pin) => {
                    debug!(
                        server = %challenge.server_name,
                        pin = %pin,
                        "Pinned public key matched"
                    );
                    return TrustDisposition::UseCredential;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unusable pinned certificate");
                }
            }
        }

        if self.pins.is_empty() {
            TrustDisposition::PerformDefaultHandling
        } else {
            warn!(
                server = %challenge.server_name,
                pins = self.pins.len(),
                "No pinned public key matched, cancelling handshake"
            );
            TrustDisposition::CancelChallenge
        }
    }

    fn name(&self) -> &'static str {
        "pinning"
    }
}

// ============================================================================
// Always Trust Validator
// ============================================================================

/// Accepts every peer.
///
/// Disables both pinning and default certificate verification. Only meant for
/// environments where the server certificate cannot be validated at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrustValidator;

impl TrustEvaluator for AlwaysTrustValidator {
    fn evaluate(&self, _challenge: &TrustChallenge<'_>) -> TrustDisposition {
        TrustDisposition::UseCredential
    }

    fn name(&self) -> &'static str {
        "always-trust"
    }
}

// ============================================================================
// Tests
// ============================================================================
