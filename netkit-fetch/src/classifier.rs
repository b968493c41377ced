//! Response classification.
//!
//! Turns a [`RawCompletion`] into either a decoded value or exactly one
//! [`NetworkingError`]. Checks run in a fixed order and the first match wins:
//!
//! 1. Connectivity transport error: [`NetworkingError::NetworkConnection`]
//! 2. Cancellation transport error: [`NetworkingError::RequestCancelled`]
//! 3. Any other transport error: [`NetworkingError::Underlying`]
//! 4. Status outside 200...399: [`NetworkingError::Http`]
//! 5. Response with an empty body: [`NetworkingError::DataTask`]
//! 6. Non-empty body: decoded, or [`NetworkingError::Decoding`]
//! 7. Nothing at all: [`NetworkingError::Unknown`]
//!
//! The status check precedes decoding, so an error page is never decoded.

use std::fmt;
use std::marker::PhantomData;

use netkit_core::{NetworkingError, RawCompletion};
use serde::de::DeserializeOwned;

// ============================================================================
// Body Decoders
// ============================================================================

/// A body the decoder refused, returned together with the cause.
#[derive(Debug)]
pub struct DecodeFailure {
    /// Why decoding failed.
    pub source: serde_json::Error,
    /// The undecoded body.
    pub body: Vec<u8>,
}

/// Turns a non-empty response body into the caller's type.
pub trait BodyDecoder: Send + Sync + 'static {
    /// The decoded type.
    type Output: Send + 'static;

    /// Decodes the body.
    fn decode(body: Vec<u8>) -> Result<Self::Output, DecodeFailure>;
}

/// Decodes the body as JSON into `T`.
pub struct JsonBody<T>(PhantomData<fn() -> T>);

impl<T> fmt::Debug for JsonBody<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonBody")
    }
}

impl<T> BodyDecoder for JsonBody<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode(body: Vec<u8>) -> Result<T, DecodeFailure> {
        serde_json::from_slice(&body).map_err(|source| DecodeFailure { source, body })
    }
}

/// Hands the body back untouched.
#[derive(Debug, Clone, Copy)]
pub struct RawBody;

impl BodyDecoder for RawBody {
    type Output = Vec<u8>;

    fn decode(body: Vec<u8>) -> Result<Vec<u8>, DecodeFailure> {
        Ok(body)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classifies a completion, decoding the body with `D`.
pub fn classify<D: BodyDecoder>(completion: RawCompletion) -> Result<D::Output, NetworkingError> {
    let RawCompletion {
        response,
        body,
        error,
    } = completion;
    let body = body.filter(|body| !body.is_empty());

    if let Some(error) = error {
        let kind = error.kind();
        return Err(if kind.is_connectivity() {
            NetworkingError::NetworkConnection(error)
        } else if kind.is_cancellation() {
            NetworkingError::RequestCancelled(error)
        } else {
            NetworkingError::Underlying {
                source: error,
                response,
                body,
            }
        });
    }

    let response = match response {
        Some(response) if !response.is_success() => {
            return Err(NetworkingError::Http { response, body });
        }
        other => other,
    };

    match (response, body) {
        (Some(response), None) => Err(NetworkingError::DataTask { response }),
        (response, Some(body)) => D::decode(body).map_err(|failure| NetworkingError::Decoding {
            source: failure.source,
            response,
            body: failure.body,
        }),
        (None, None) => Err(NetworkingError::Unknown(None)),
    }
}

/// Classifies a completion, decoding a JSON body into `T`.
pub fn classify_json<T>(completion: RawCompletion) -> Result<T, NetworkingError>
where
    T: DeserializeOwned + Send + 'static,
{
    classify::<JsonBody<T>>(completion)
}

/// Classifies a completion, returning the body bytes verbatim on success.
pub fn classify_bytes(completion: RawCompletion) -> Result<Vec<u8>, NetworkingError> {
    classify::<RawBody>(completion)
}
