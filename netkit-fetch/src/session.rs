//! The request session.
//!
//! A [`Session`] owns one transport configuration: timeouts, configuration
//! kind, the trust evaluator consulted during TLS handshakes, the registry
//! of in-flight requests and the test interception switch.
//!
//! ## Usage
//!
//! ```ignore
//! let session = Session::new(SessionSettings::default())?;
//!
//! let search: Search = session
//!     .dispatch(Request::get("https://itunes.apple.com/search")?.with_query([("term", "rust")]))
//!     .await?;
//! ```
//!
//! Mutations rebuild the live transport as a whole and only affect requests
//! dispatched afterwards.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use netkit_core::{
    NetworkObserver, Networkable, NetworkingError, RawCompletion, Request, TaskId, TransportError,
};
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, debug_span, info, instrument, warn};

use crate::classifier::{BodyDecoder, JsonBody, RawBody, classify};
use crate::completion::CompletionQueue;
use crate::error::FetchError;
use crate::logs;
use crate::registry::{TaskRegistry, TaskSummary};
use crate::settings::{ConfigurationKind, SessionSettings};
use crate::transport::{InterceptionLayer, LiveTransport, StubOutcome, Transport};
use crate::trust::{AlwaysTrustValidator, PinningValidator, TrustEvaluator};

// ============================================================================
// Session State
// ============================================================================

/// Everything that is replaced as a unit on reconfiguration.
#[derive(Debug)]
struct SessionState {
    settings: SessionSettings,
    trust: Arc<dyn TrustEvaluator>,
    live: Arc<LiveTransport>,
}

impl SessionState {
    fn build(settings: SessionSettings) -> Result<Self, FetchError> {
        let trust: Arc<dyn TrustEvaluator> = if settings.trust_all_peers {
            Arc::new(AlwaysTrustValidator)
        } else {
            Arc::new(PinningValidator::new(settings.pinned_certificates.clone()))
        };
        let live = Arc::new(LiveTransport::build(&settings.transport, Arc::clone(&trust))?);

        Ok(Self {
            settings,
            trust,
            live,
        })
    }
}

struct SessionInner {
    state: RwLock<SessionState>,
    registry: Arc<TaskRegistry>,
    interception: InterceptionLayer,
    observer: Option<Arc<dyn NetworkObserver>>,
    completions: Mutex<Option<CompletionQueue>>,
}

// ============================================================================
// Session
// ============================================================================

/// An HTTP session with certificate pinning, typed errors and test
/// interception.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a session with the given settings.
    pub fn new(settings: SessionSettings) -> Result<Self, FetchError> {
        Self::builder().settings(settings).build()
    }

    /// Creates a builder for customizing the session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Returns the process wide default session, creating it on first use.
    ///
    /// # Panics
    ///
    /// Panics if the default session cannot be created. This should only
    /// happen if the TLS setup is broken, which leaves the application
    /// unable to make any request.
    pub fn shared() -> &'static Session {
        static SHARED: OnceLock<Session> = OnceLock::new();
        SHARED.get_or_init(|| {
            Session::new(SessionSettings::default()).unwrap_or_else(|e| {
                panic!(
                    "Failed to create the shared session: {e}. \
                    This usually indicates a broken TLS configuration."
                )
            })
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` to a copy of the settings and swaps in the rebuilt
    /// state. On error the previous state stays in place.
    fn reconfigure(&self, change: impl FnOnce(&mut SessionSettings)) -> Result<(), FetchError> {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut settings = state.settings.clone();
        change(&mut settings);
        *state = SessionState::build(settings)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> SessionSettings {
        self.state().settings.clone()
    }

    /// Returns the name of the trust evaluator in use.
    pub fn trust_evaluator(&self) -> &'static str {
        self.state().trust.name()
    }

    /// Sets the idle and whole request timeouts.
    #[instrument(skip(self))]
    pub fn configure_timeouts(&self, request: Duration, resource: Duration) -> Result<(), FetchError> {
        self.reconfigure(|settings| {
            settings.transport.request_timeout = request;
            settings.transport.resource_timeout = resource;
        })?;
        info!("Timeouts updated");
        Ok(())
    }

    /// Switches between the default and ephemeral configuration.
    #[instrument(skip(self))]
    pub fn set_configuration(&self, configuration: ConfigurationKind) -> Result<(), FetchError> {
        self.reconfigure(|settings| settings.transport.configuration = configuration)?;
        info!("Configuration updated");
        Ok(())
    }

    /// Replaces the pinned certificate paths.
    ///
    /// An empty list turns pinning off and defers to default verification.
    pub fn set_pinned_certificates<I, P>(&self, paths: I) -> Result<(), FetchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let count = paths.len();
        self.reconfigure(|settings| settings.pinned_certificates = paths)?;
        info!(pins = count, "Pinned certificates updated");
        Ok(())
    }

    /// Accepts every TLS peer from now on.
    ///
    /// Disables both pinning and default certificate verification.
    pub fn trust_all_peers(&self) -> Result<(), FetchError> {
        self.reconfigure(|settings| settings.trust_all_peers = true)?;
        warn!("TLS peer verification disabled, every certificate will be accepted");
        Ok(())
    }

    /// Restores the pinning evaluator after [`Session::trust_all_peers`].
    pub fn use_pinning(&self) -> Result<(), FetchError> {
        self.reconfigure(|settings| settings.trust_all_peers = false)?;
        info!("Certificate pinning restored");
        Ok(())
    }

    /// Turns developer mode dumps on or off.
    pub fn set_developer_mode(&self, enabled: bool) {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .developer_mode = enabled;
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Dispatches a request and decodes a JSON body into `T`.
    ///
    /// Must be called within a Tokio runtime. The request starts
    /// immediately; awaiting the handle only waits for its outcome, and
    /// dropping the handle does not cancel the request.
    pub fn dispatch<T>(&self, request: Request) -> TaskHandle<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.dispatch_with::<JsonBody<T>>(request)
    }

    /// Dispatches a request and returns the body bytes without decoding.
    pub fn dispatch_bytes(&self, request: Request) -> TaskHandle<Vec<u8>> {
        self.dispatch_with::<RawBody>(request)
    }

    /// Dispatches the request described by an endpoint.
    pub fn dispatch_endpoint<T, E>(&self, endpoint: &E) -> TaskHandle<T>
    where
        T: DeserializeOwned + Send + 'static,
        E: Networkable + ?Sized,
    {
        self.dispatch(endpoint.request())
    }

    /// Dispatches a request and hands the decoded outcome to `completion`.
    ///
    /// Completions run one at a time on the session's completion queue.
    pub fn fetch<T, F>(&self, request: Request, completion: F) -> TaskId
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, NetworkingError>) + Send + 'static,
    {
        let handle = self.dispatch::<T>(request);
        self.deliver(handle, completion)
    }

    /// Callback variant of [`Session::dispatch_bytes`].
    pub fn fetch_bytes<F>(&self, request: Request, completion: F) -> TaskId
    where
        F: FnOnce(Result<Vec<u8>, NetworkingError>) + Send + 'static,
    {
        let handle = self.dispatch_bytes(request);
        self.deliver(handle, completion)
    }

    /// Returns the completion queue, starting a new one on the current
    /// runtime if none is running.
    fn completion_queue(&self) -> CompletionQueue {
        let mut slot = self
            .inner
            .completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = slot.as_ref().filter(|queue| !queue.is_closed()) {
            return queue.clone();
        }
        if slot.is_some() {
            debug!("Completion queue stopped, starting a new one");
        }
        let queue = CompletionQueue::spawn();
        *slot = Some(queue.clone());
        queue
    }

    fn deliver<T, F>(&self, handle: TaskHandle<T>, completion: F) -> TaskId
    where
        T: Send + 'static,
        F: FnOnce(Result<T, NetworkingError>) + Send + 'static,
    {
        let id = handle.id();
        let queue = self.completion_queue();

        tokio::spawn(async move {
            let outcome = handle.await;
            if let Err(job) = queue.submit(move || completion(outcome)) {
                warn!(task = %id, "Completion queue stopped, running completion inline");
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(task = %id, "Completion callback panicked");
                }
            }
        });
        id
    }

    fn dispatch_with<D: BodyDecoder>(&self, request: Request) -> TaskHandle<D::Output> {
        let id = TaskId::new();
        let (transport, developer_mode) = {
            let state = self.state();
            let transport: Arc<dyn Transport> = match self.inner.interception.route() {
                Some(stub) => stub,
                None => state.live.clone(),
            };
            (transport, state.settings.developer_mode)
        };

        let (guard, cancelled) = self.inner.registry.register(id, &request);
        let (sender, receiver) = oneshot::channel();

        debug!(
            task = %id,
            method = %request.method(),
            url = %request.url(),
            transport = transport.name(),
            "Dispatching request"
        );
        if let Some(observer) = &self.inner.observer {
            observer.task_created(id, &request);
        }
        if developer_mode {
            logs::request(id, &request);
        }

        let observer = self.inner.observer.clone();
        let span = debug_span!("request", task = %id);
        tokio::spawn(
            async move {
                let completion = tokio::select! {
                    biased;
                    _ = cancelled => RawCompletion::failed(TransportError::cancelled()),
                    completion = transport.execute(&request) => completion,
                };
                if developer_mode {
                    logs::response(id, &completion);
                }
                if let (Some(observer), Some(response)) = (&observer, &completion.response) {
                    let body = completion.body.as_deref().unwrap_or_default();
                    observer.task_received(id, response, body);
                }

                let outcome = classify::<D>(completion);
                drop(guard);

                match &outcome {
                    Ok(_) => debug!("Request succeeded"),
                    Err(e) => {
                        debug!(error = %e, "Request failed");
                        if developer_mode {
                            logs::failure(id, e);
                        }
                    }
                }
                if let Some(observer) = &observer {
                    observer.task_completed(id, &request, outcome.as_ref().map(|_| ()));
                }
                // The caller may have dropped the handle.
                let _ = sender.send(outcome);
            }
            .instrument(span),
        );

        TaskHandle {
            id,
            registry: Arc::clone(&self.inner.registry),
            receiver,
        }
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    /// Cancels one request. Returns false if it is no longer in flight.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner.registry.cancel(id)
    }

    /// Cancels every in-flight request.
    ///
    /// Each cancelled request still completes, with
    /// [`NetworkingError::RequestCancelled`]. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.registry.cancel_all();
        info!(cancelled, "Cancelled all in-flight requests");
        cancelled
    }

    /// Returns the number of in-flight requests.
    pub fn in_flight_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Returns the in-flight requests, oldest first.
    pub fn in_flight_tasks(&self) -> Vec<TaskSummary> {
        self.inner.registry.snapshot()
    }

    // ------------------------------------------------------------------------
    // Interception
    // ------------------------------------------------------------------------

    /// Routes all following requests to a stub answering with `outcome`
    /// after `delay`. Returns false if interception is disallowed.
    pub fn set_stub_outcome(&self, outcome: StubOutcome, delay: Duration) -> bool {
        self.inner.interception.arm(outcome, delay)
    }

    /// Routes following requests back to the network.
    pub fn clear_stub_outcome(&self) {
        self.inner.interception.clear();
    }

    /// Returns true if a stub outcome is armed.
    pub fn is_stub_armed(&self) -> bool {
        self.inner.interception.is_armed()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Session")
            .field("settings", &state.settings)
            .field("trust", &state.trust.name())
            .field("in_flight", &self.inner.registry.len())
            .field("stub_armed", &self.inner.interception.is_armed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session Builder
// ============================================================================

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    settings: SessionSettings,
    observer: Option<Arc<dyn NetworkObserver>>,
}

impl SessionBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets all settings at once.
    #[must_use]
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the idle and whole request timeouts.
    #[must_use]
    pub fn timeouts(mut self, request: Duration, resource: Duration) -> Self {
        self.settings = self.settings.with_timeouts(request, resource);
        self
    }

    /// Sets the pinned certificate paths.
    #[must_use]
    pub fn pinned_certificates<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.settings = self.settings.with_pinned_certificates(paths);
        self
    }

    /// Allows or forbids arming the test stub.
    #[must_use]
    pub fn interception(mut self, allowed: bool) -> Self {
        self.settings.allow_interception = allowed;
        self
    }

    /// Sets the lifecycle observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn NetworkObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Builds the session.
    pub fn build(self) -> Result<Session, FetchError> {
        let interception = InterceptionLayer::new(self.settings.allow_interception);
        let state = SessionState::build(self.settings)?;
        debug!(trust = state.trust.name(), "Session created");

        Ok(Session {
            inner: Arc::new(SessionInner {
                state: RwLock::new(state),
                registry: Arc::new(TaskRegistry::new()),
                interception,
                observer: self.observer,
                completions: Mutex::new(None),
            }),
        })
    }
}

// ============================================================================
// Task Handle
// ============================================================================

/// The pending outcome of a dispatched request.
///
/// Resolves exactly once, to the decoded value or a [`NetworkingError`].
pub struct TaskHandle<T> {
    id: TaskId,
    registry: Arc<TaskRegistry>,
    receiver: oneshot::Receiver<Result<T, NetworkingError>>,
}

impl<T> TaskHandle<T> {
    /// Returns the request's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Cancels the request. Returns false if it already finished.
    pub fn cancel(&self) -> bool {
        self.registry.cancel(self.id)
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, NetworkingError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A worker that died without sending counts as an unknown failure.
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(NetworkingError::Unknown(None))))
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netkit_core::TransportErrorKind;

    fn session() -> Session {
        Session::builder().interception(true).build().unwrap()
    }

    #[test]
    fn test_trust_evaluator_swaps() {
        let session = session();
        assert_eq!(session.trust_evaluator(), "pinning");

        session.trust_all_peers().unwrap();
        assert_eq!(session.trust_evaluator(), "always-trust");
        assert!(session.settings().trust_all_peers);

        session.use_pinning().unwrap();
        assert_eq!(session.trust_evaluator(), "pinning");
    }

    #[test]
    fn test_reconfiguration_updates_settings() {
        let session = session();
        session
            .configure_timeouts(Duration::from_secs(5), Duration::from_secs(20))
            .unwrap();
        session.set_configuration(ConfigurationKind::Ephemeral).unwrap();
        session.set_pinned_certificates(["a.der", "b.der"]).unwrap();

        let settings = session.settings();
        assert_eq!(settings.transport.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.transport.resource_timeout, Duration::from_secs(20));
        assert_eq!(settings.transport.configuration, ConfigurationKind::Ephemeral);
        assert_eq!(settings.pinned_certificates.len(), 2);
    }

    #[test]
    fn test_shared_is_one_instance() {
        assert!(Arc::ptr_eq(&Session::shared().inner, &Session::shared().inner));
    }

    #[test]
    fn test_interception_refused_when_disallowed() {
        let session = Session::builder().interception(false).build().unwrap();
        assert!(!session.set_stub_outcome(StubOutcome::FailureStatusCode(500), Duration::ZERO));
        assert!(!session.is_stub_armed());
    }

    #[tokio::test]
    async fn test_task_handle_cancel() {
        let session = session();
        session.set_stub_outcome(StubOutcome::Success(b"late".to_vec()), Duration::from_secs(30));

        let handle = session.dispatch_bytes(Request::get("https://api.example.com/slow").unwrap());
        assert_eq!(session.in_flight_count(), 1);
        assert!(handle.cancel());

        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.transport_error().unwrap().kind(), TransportErrorKind::Cancelled);
        assert_eq!(session.in_flight_count(), 0);
    }
}
