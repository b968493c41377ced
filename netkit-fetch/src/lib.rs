// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `NetKit` Fetch
//!
//! Request execution engine for `NetKit`.
//!
//! ## Session
//!
//! [`Session`] owns the transport configuration and the registry of
//! in-flight requests:
//!
//! - [`session`] - Dispatch, cancellation, reconfiguration
//! - [`registry`] - In-flight task bookkeeping
//! - [`completion`] - Serial queue for callback completions
//! - [`settings`] / [`config`] - Programmatic and on-disk configuration
//!
//! ## Trust
//!
//! - [`trust::validator`] - Public key pinning and trust-all evaluators
//! - [`trust::verifier`] - rustls verifier delegating to an evaluator
//!
//! ## Transports
//!
//! - [`transport::live`] - `reqwest` client
//! - [`transport::stub`] - Canned outcomes for tests
//!
//! ## Classification
//!
//! [`classifier`] turns raw transport outcomes into a value or a
//! [`netkit_core::NetworkingError`].
//!
//! ## Example
//!
//! ```ignore
//! use netkit_core::Request;
//! use netkit_fetch::{Session, SessionSettings};
//!
//! let session = Session::new(
//!     SessionSettings::default().with_pinned_certificates(["certs/api.der"]),
//! )?;
//!
//! let body = session
//!     .dispatch_bytes(Request::get("https://api.example.com/status")?)
//!     .await?;
//! ```

// Core modules
pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod logs;
pub mod registry;
pub mod session;
pub mod settings;
pub mod transport;
pub mod trust;

// Re-export key types at crate root

// Errors
pub use error::{FetchError, PinError};

// Session
pub use config::SessionConfig;
pub use registry::TaskSummary;
pub use session::{Session, SessionBuilder, TaskHandle};
pub use settings::{ConfigurationKind, SessionSettings, TransportSettings};

// Classification
pub use classifier::{BodyDecoder, JsonBody, RawBody, classify, classify_bytes, classify_json};

// Transports
pub use transport::{StubOutcome, Transport};

// Trust
pub use trust::{
    AlwaysTrustValidator, PinnedCertificate, PinningValidator, TrustDisposition, TrustEvaluator,
};
