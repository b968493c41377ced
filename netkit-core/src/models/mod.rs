//! Domain models for `NetKit`.
//!
//! ## Submodules
//!
//! - [`request`] - Outgoing requests and body encodings
//! - [`response`] - Response metadata and raw transport completions
//! - [`task`] - Identifiers for dispatched requests

mod request;
mod response;
mod task;

// Re-export everything at the models level
pub use request::{ContentType, HttpMethod, MultipartFile, Request};
pub use response::{RawCompletion, ResponseMeta};
pub use task::TaskId;
