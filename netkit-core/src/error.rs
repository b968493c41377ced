//! Error types for `NetKit`.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::models::ResponseMeta;

// ============================================================================
// Core Error
// ============================================================================

/// Errors raised while building requests or loading local resources.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A request body could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Transport Error
// ============================================================================

/// Category of a failure raised below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The device has no usable network.
    NotConnected,
    /// An established connection dropped mid-request.
    ConnectionLost,
    /// The host could not be reached (DNS, refused, unreachable).
    CannotConnectToHost,
    /// The request was cancelled by the client, including TLS pin rejection.
    Cancelled,
    /// A configured timeout elapsed.
    TimedOut,
    /// TLS handshake failure other than pin rejection.
    Tls,
    /// The response body could not be read.
    Body,
    /// Anything else.
    Other,
}

impl TransportErrorKind {
    /// Returns true for failures caused by missing or lost connectivity.
    pub fn is_connectivity(self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionLost | Self::CannotConnectToHost
        )
    }

    /// Returns true for client-initiated cancellation.
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns a stable identifier for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::ConnectionLost => "connection_lost",
            Self::CannotConnectToHost => "cannot_connect_to_host",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::Tls => "tls",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by the transport before an HTTP status could be judged.
///
/// Cheap to clone so that a single programmed stub failure can be handed to
/// every intercepted request.
#[derive(Debug, Clone)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    pin_rejected: bool,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Creates a transport error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pin_rejected: false,
            source: None,
        }
    }

    /// Attaches the lower level error that caused this one.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// No network connection is available.
    pub fn not_connected() -> Self {
        Self::new(TransportErrorKind::NotConnected, "The Internet connection appears to be offline")
    }

    /// The connection was lost while the request was running.
    pub fn connection_lost() -> Self {
        Self::new(TransportErrorKind::ConnectionLost, "The network connection was lost")
    }

    /// The request was cancelled by the client.
    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "The request was cancelled")
    }

    /// The peer failed certificate pinning and the handshake was cancelled.
    pub fn pin_rejected(detail: impl Into<String>) -> Self {
        let mut error = Self::new(TransportErrorKind::Cancelled, detail);
        error.pin_rejected = true;
        error
    }

    /// Returns the failure category.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true when the cancellation came from a TLS pin mismatch.
    ///
    /// Pin rejection still has [`TransportErrorKind::Cancelled`] as its kind.
    pub fn is_pin_rejection(&self) -> bool {
        self.pin_rejected
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ============================================================================
// Networking Error
// ============================================================================

/// The classified failure of a single request.
///
/// Exactly one of these (or a success value) is produced per dispatched
/// request.
#[derive(Debug, Error)]
pub enum NetworkingError {
    /// The request failed because there is no usable network connection.
    #[error("Couldn't connect to the network: {0}")]
    NetworkConnection(#[source] TransportError),

    /// The request was cancelled before it completed.
    #[error("Request cancelled: {0}")]
    RequestCancelled(#[source] TransportError),

    /// The request failed with a transport error that is not connectivity related.
    #[error("Underlying error: {source}")]
    Underlying {
        /// The transport failure.
        source: TransportError,
        /// Response metadata, if any was received.
        response: Option<ResponseMeta>,
        /// Body bytes, if any were received.
        body: Option<Vec<u8>>,
    },

    /// The server answered with a status outside 200...399.
    #[error("HTTP error: status code {}", .response.status)]
    Http {
        /// Response metadata.
        response: ResponseMeta,
        /// Body bytes, if any were received.
        body: Option<Vec<u8>>,
    },

    /// The server answered successfully but sent no body.
    #[error("Couldn't find data (status code {})", .response.status)]
    DataTask {
        /// Response metadata.
        response: ResponseMeta,
    },

    /// The body could not be decoded into the requested type.
    #[error("Decoding error: {source}")]
    Decoding {
        /// The decoder failure.
        source: serde_json::Error,
        /// Response metadata, if any was received.
        response: Option<ResponseMeta>,
        /// The undecoded body.
        body: Vec<u8>,
    },

    /// Nothing usable was received.
    #[error("Unknown error")]
    Unknown(Option<TransportError>),
}

impl NetworkingError {
    /// Returns a short title for the error kind.
    pub fn title(&self) -> &'static str {
        match self {
            Self::NetworkConnection(_) => "Network Connection Error",
            Self::RequestCancelled(_) => "Request Cancelled",
            Self::Underlying { .. } => "Underlying Error",
            Self::Http { .. } => "HTTP Error",
            Self::DataTask { .. } => "Data Task Error",
            Self::Decoding { .. } => "Decoding Error",
            Self::Unknown(_) => "Unknown Error",
        }
    }

    /// Returns the response metadata available when the error occurred.
    pub fn response(&self) -> Option<&ResponseMeta> {
        match self {
            Self::Http { response, .. } | Self::DataTask { response } => Some(response),
            Self::Underlying { response, .. } | Self::Decoding { response, .. } => {
                response.as_ref()
            }
            Self::NetworkConnection(_) | Self::RequestCancelled(_) | Self::Unknown(_) => None,
        }
    }

    /// Returns the raw body received, if any.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Underlying { body, .. } | Self::Http { body, .. } => body.as_deref(),
            Self::Decoding { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns the HTTP status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|response| response.status)
    }

    /// Returns the transport failure carried by this error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::NetworkConnection(error)
            | Self::RequestCancelled(error)
            | Self::Underlying { source: error, .. } => Some(error),
            Self::Unknown(error) => error.as_ref(),
            _ => None,
        }
    }

    /// Returns true if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::RequestCancelled(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
