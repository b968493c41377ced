//! Response-related types.
//!
//! - [`ResponseMeta`] - Status line and headers of a received response
//! - [`RawCompletion`] - The unclassified outcome a transport produces

use std::collections::BTreeMap;

use url::Url;

use crate::error::TransportError;

// ============================================================================
// Response Metadata
// ============================================================================

/// Metadata of a received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// Final URL of the response (after redirects).
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Response headers. Names are lowercase.
    pub headers: BTreeMap<String, String>,
}

impl ResponseMeta {
    /// Creates response metadata without headers.
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            url,
            status,
            headers: BTreeMap::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns true if the status is within 200...399.
    pub fn is_success(&self) -> bool {
        (200..=399).contains(&self.status)
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

// ============================================================================
// Raw Completion
// ============================================================================

/// The unclassified outcome of one request as produced by a transport.
///
/// Any combination of the three parts may be present; the classifier decides
/// what they mean.
#[derive(Debug, Clone, Default)]
pub struct RawCompletion {
    /// Response metadata, if a response was received.
    pub response: Option<ResponseMeta>,
    /// Body bytes, if any were read.
    pub body: Option<Vec<u8>>,
    /// Transport failure, if one occurred.
    pub error: Option<TransportError>,
}

impl RawCompletion {
    /// A received response with its body.
    pub fn received(response: ResponseMeta, body: Vec<u8>) -> Self {
        Self {
            response: Some(response),
            body: Some(body),
            error: None,
        }
    }

    /// A transport failure with nothing received.
    pub fn failed(error: TransportError) -> Self {
        Self {
            response: None,
            body: None,
            error: Some(error),
        }
    }

    /// Returns true if the body is absent or empty.
    pub fn body_is_empty(&self) -> bool {
        self.body.as_ref().is_none_or(Vec::is_empty)
    }
}
