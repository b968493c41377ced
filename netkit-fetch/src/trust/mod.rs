//! TLS trust decisions.
//!
//! - [`validator`] - Trust evaluators (pinning and trust-all) and pinned keys
//! - [`verifier`] - Adapter plugging an evaluator into the rustls handshake

pub mod validator;
pub mod verifier;

// Re-export key types
pub use validator::{
    AlwaysTrustValidator, AuthenticationMethod, PinnedCertificate, PinningValidator,
    TrustChallenge, TrustDisposition, TrustEvaluator,
};
pub use verifier::{PIN_REJECTED, TrustDelegateVerifier, client_config, is_pin_rejection};
