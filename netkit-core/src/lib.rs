// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `NetKit` Core
//!
//! Core types shared by every `NetKit` crate:
//!
//! - Request models (method, body encoding, multipart files)
//! - Response metadata and the raw transport completion
//! - The error taxonomy reported to callers
//! - Trait definitions for endpoints and observers
//!
//! ## Key Types
//!
//! ### Requests
//! - [`Request`] - An outgoing HTTP request with its body encoding
//! - [`ContentType`] - Body encoding, always reflected in `Content-Type`
//! - [`MultipartFile`] - A file part for multipart uploads
//!
//! ### Responses
//! - [`ResponseMeta`] - Status, headers and URL of a received response
//! - [`RawCompletion`] - What a transport hands back before classification
//!
//! ### Errors
//! - [`NetworkingError`] - The classified failure delivered to callers
//! - [`TransportError`] - A failure raised below HTTP (connectivity, TLS, ...)
//! - [`CoreError`] - Request construction failures

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::{CoreError, NetworkingError, TransportError, TransportErrorKind};

// Re-export all model types
pub use models::{
    // Requests
    ContentType,
    HttpMethod,
    MultipartFile,
    Request,
    // Responses
    RawCompletion,
    ResponseMeta,
    // Identifiers
    TaskId,
};

// Re-export traits
pub use traits::{NetworkObserver, Networkable};
