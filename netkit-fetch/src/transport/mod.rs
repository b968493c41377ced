//! Transports execute requests and hand back raw completions.
//!
//! - [`live`] - `reqwest` client with the pinning aware TLS verifier
//! - [`stub`] - Canned outcomes for tests, armed through the interception layer

use std::fmt;

use async_trait::async_trait;
use netkit_core::{RawCompletion, Request};

pub mod live;
pub mod stub;

pub use live::LiveTransport;
pub use stub::{InterceptionLayer, StubOutcome, StubTransport};

/// Executes one request.
///
/// Transports never fail; every failure is carried inside the returned
/// [`RawCompletion`] and left to the classifier.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Returns a short name for logging.
    fn name(&self) -> &'static str;

    /// Executes the request.
    async fn execute(&self, request: &Request) -> RawCompletion;
}
