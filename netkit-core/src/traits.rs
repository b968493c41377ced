//! Trait definitions for `NetKit`.

use crate::error::NetworkingError;
use crate::models::{Request, ResponseMeta, TaskId};

/// A type that describes one remote endpoint.
///
/// Typically implemented by an enum with one variant per API call, each
/// variant building its [`Request`].
pub trait Networkable {
    /// Returns the request for this endpoint.
    fn request(&self) -> Request;
}

/// Receives notifications about the lifecycle of dispatched requests.
///
/// All methods have empty default implementations. Implementations are
/// called from arbitrary worker threads and must not block.
pub trait NetworkObserver: Send + Sync {
    /// Called right after a request has been registered as in flight.
    fn task_created(&self, _id: TaskId, _request: &Request) {}

    /// Called when a response arrived, before it is classified.
    ///
    /// Not called for requests that failed without a response. `body` is
    /// empty when the response carried none.
    fn task_received(&self, _id: TaskId, _response: &ResponseMeta, _body: &[u8]) {}

    /// Called once per request with its classified outcome.
    fn task_completed(&self, _id: TaskId, _request: &Request, _outcome: Result<(), &NetworkingError>) {}
}
