//! Adapter from [`TrustEvaluator`] to the rustls certificate verifier.

use std::error::Error as StdError;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, trace};

use super::validator::{TrustChallenge, TrustDisposition, TrustEvaluator};
use crate::error::FetchError;

/// Message carried by the rustls error raised when an evaluator cancels
/// the handshake.
pub const PIN_REJECTED: &str = "netkit: certificate pinning rejected the peer";

/// Certificate verifier that asks a [`TrustEvaluator`] first.
///
/// `UseCredential` accepts the chain as is, `CancelChallenge` aborts the
/// handshake and `PerformDefaultHandling` runs WebPKI verification against
/// the bundled Mozilla roots. Handshake signatures are always checked.
#[derive(Debug)]
pub struct TrustDelegateVerifier {
    evaluator: Arc<dyn TrustEvaluator>,
    fallback: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
}

impl TrustDelegateVerifier {
    /// Creates a verifier delegating to `evaluator`.
    pub fn new(
        evaluator: Arc<dyn TrustEvaluator>,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, FetchError> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let fallback = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| FetchError::Verifier(e.to_string()))?;

        Ok(Self {
            evaluator,
            fallback,
            provider,
        })
    }

    /// Returns the evaluator consulted on every handshake.
    pub fn evaluator(&self) -> &Arc<dyn TrustEvaluator> {
        &self.evaluator
    }
}

impl ServerCertVerifier for TrustDelegateVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain: Vec<CertificateDer<'_>> = std::iter::once(CertificateDer::from(end_entity.as_ref()))
            .chain(intermediates.iter().map(|cert| CertificateDer::from(cert.as_ref())))
            .collect();
        let name = server_name.to_str();
        let challenge = TrustChallenge::server_trust(&name, &chain);

        let disposition = self.evaluator.evaluate(&challenge);
        debug!(
            server = %name,
            evaluator = self.evaluator.name(),
            chain_len = chain.len(),
            ?disposition,
            "Trust challenge evaluated"
        );

        match disposition {
            TrustDisposition::UseCredential => Ok(ServerCertVerified::assertion()),
            TrustDisposition::CancelChallenge => {
                Err(rustls::Error::General(PIN_REJECTED.to_string()))
            }
            TrustDisposition::PerformDefaultHandling => self.fallback.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Builds a rustls client configuration that routes every server trust
/// decision through `evaluator`.
pub fn client_config(evaluator: Arc<dyn TrustEvaluator>) -> Result<ClientConfig, FetchError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    trace!(evaluator = evaluator.name(), "Building TLS client config");
    let verifier = TrustDelegateVerifier::new(evaluator, provider.clone())?;

    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

/// Returns true when `error`, or anything in its source chain, is the
/// handshake cancellation raised by [`TrustDelegateVerifier`].
pub fn is_pin_rejection(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(rustls::Error::General(message)) = err.downcast_ref::<rustls::Error>() {
            if message == PIN_REJECTED {
                return true;
            }
        }
        // io::Error::source skips the wrapped error itself
        if let Some(inner) = err
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::get_ref)
        {
            if is_pin_rejection(inner) {
                return true;
            }
        }
        if err.to_string().contains(PIN_REJECTED) {
            return true;
        }
        current = err.source();
    }
    false
}

// ============================================================================
// Tests
// ============================================================================
