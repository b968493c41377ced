//! Canned transport for tests.
//!
//! The [`InterceptionLayer`] holds at most one armed [`StubTransport`]. While
//! armed, every newly dispatched request is routed to the stub instead of
//! the network. The route is picked at dispatch time, so arming or clearing
//! never changes a request that is already running.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use netkit_core::{RawCompletion, Request, ResponseMeta, TransportError};
use serde::Serialize;
use tracing::{info, warn};

use super::Transport;
use crate::error::FetchError;

// ============================================================================
// Stub Outcome
// ============================================================================

/// What an armed stub answers with.
#[derive(Debug, Clone)]
pub enum StubOutcome {
    /// Status 200 with these body bytes.
    Success(Vec<u8>),
    /// The transport error, with no response.
    Failure(TransportError),
    /// This status code with an empty body.
    FailureStatusCode(u16),
}

impl StubOutcome {
    /// Success outcome with the contents of a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        Ok(Self::Success(std::fs::read(path)?))
    }

    /// Success outcome with a JSON encoded value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, FetchError> {
        Ok(Self::Success(serde_json::to_vec(value)?))
    }
}

// ============================================================================
// Stub Transport
// ============================================================================

/// Transport that answers every request with the same outcome.
#[derive(Debug, Clone)]
pub struct StubTransport {
    outcome: StubOutcome,
    delay: Duration,
}

impl StubTransport {
    /// Creates a stub answering after `delay`.
    pub fn new(outcome: StubOutcome, delay: Duration) -> Self {
        Self { outcome, delay }
    }

    /// Returns the programmed outcome.
    pub fn outcome(&self) -> &StubOutcome {
        &self.outcome
    }

    /// Returns the delay before answering.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn execute(&self, request: &Request) -> RawCompletion {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.outcome {
            StubOutcome::Success(body) => {
                RawCompletion::received(ResponseMeta::new(request.url().clone(), 200), body.clone())
            }
            StubOutcome::Failure(error) => RawCompletion::failed(error.clone()),
            StubOutcome::FailureStatusCode(status) => {
                RawCompletion::received(ResponseMeta::new(request.url().clone(), *status), Vec::new())
            }
        }
    }
}

// ============================================================================
// Interception Layer
// ============================================================================

/// The switch between the live transport and an armed stub.
#[derive(Debug)]
pub struct InterceptionLayer {
    allowed: bool,
    armed: RwLock<Option<Arc<StubTransport>>>,
}

impl InterceptionLayer {
    /// Creates a disarmed layer. When `allowed` is false arming is refused.
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed,
            armed: RwLock::new(None),
        }
    }

    /// Returns true if the stub may be armed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Arms the stub for all following requests. Returns false if refused.
    pub fn arm(&self, outcome: StubOutcome, delay: Duration) -> bool {
        if !self.allowed {
            warn!("Interception is disabled for this session, ignoring stub outcome");
            return false;
        }
        info!(?delay, "Stub transport armed");
        *self.armed.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(StubTransport::new(outcome, delay)));
        true
    }

    /// Disarms the stub.
    pub fn clear(&self) {
        if self
            .armed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("Stub transport cleared");
        }
    }

    /// Returns true if a stub is armed.
    pub fn is_armed(&self) -> bool {
        self.armed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the armed stub, if any.
    pub fn route(&self) -> Option<Arc<StubTransport>> {
        self.armed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netkit_core::TransportErrorKind;

    fn request() -> Request {
        Request::get("https://itunes.apple.com/search?term=x").unwrap()
    }

    #[tokio::test]
    async fn test_success_outcome() {
        let stub = StubTransport::new(StubOutcome::Success(b"hi".to_vec()), Duration::ZERO);
        let completion = stub.execute(&request()).await;

        assert_eq!(completion.response.unwrap().status, 200);
        assert_eq!(completion.body.unwrap(), b"hi");
        assert!(completion.error.is_none());
    }

    #[tokio::test]
    async fn test_status_code_outcome() {
        let stub = StubTransport::new(StubOutcome::FailureStatusCode(404), Duration::ZERO);
        let completion = stub.execute(&request()).await;

        assert_eq!(completion.response.as_ref().unwrap().status, 404);
        assert!(completion.body_is_empty());
    }

    #[tokio::test]
    async fn test_failure_outcome() {
        let stub = StubTransport::new(
            StubOutcome::Failure(TransportError::not_connected()),
            Duration::ZERO,
        );
        let completion = stub.execute(&request()).await;

        assert_eq!(completion.error.unwrap().kind(), TransportErrorKind::NotConnected);
        assert!(completion.response.is_none());
    }

    #[tokio::test]
    async fn test_delay_is_honoured() {
        let stub =
            StubTransport::new(StubOutcome::FailureStatusCode(500), Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        stub.execute(&request()).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_arm_and_clear() {
        let layer = InterceptionLayer::new(true);
        assert!(!layer.is_armed());

        assert!(layer.arm(StubOutcome::FailureStatusCode(500), Duration::ZERO));
        assert!(layer.is_armed());
        assert!(layer.route().is_some());

        layer.clear();
        assert!(!layer.is_armed());
        assert!(layer.route().is_none());
    }

    #[test]
    fn test_arm_refused_when_disallowed() {
        let layer = InterceptionLayer::new(false);
        assert!(!layer.arm(StubOutcome::FailureStatusCode(500), Duration::ZERO));
        assert!(!layer.is_armed());
    }

    #[test]
    fn test_outcome_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, br#"{"resultCount":0}"#).unwrap();

        let StubOutcome::Success(body) = StubOutcome::from_file(&path).unwrap() else {
            panic!("expected success outcome");
        };
        assert_eq!(body, br#"{"resultCount":0}"#);
        assert!(StubOutcome::from_file(dir.path().join("missing.json")).is_err());
    }
}
