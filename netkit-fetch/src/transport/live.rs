//! Live network transport.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use netkit_core::{
    HttpMethod, RawCompletion, Request, ResponseMeta, TransportError, TransportErrorKind,
};
use reqwest::{Client, Method};
use tracing::{debug, instrument};

use super::Transport;
use crate::error::FetchError;
use crate::settings::TransportSettings;
use crate::trust::{TrustEvaluator, client_config, is_pin_rejection};

/// User agent sent with every live request.
const USER_AGENT: &str = concat!("netkit/", env!("CARGO_PKG_VERSION"));

/// Transport backed by a `reqwest` client.
///
/// The client is immutable; changing timeouts, configuration kind or trust
/// evaluator means building a new `LiveTransport`.
#[derive(Debug, Clone)]
pub struct LiveTransport {
    client: Client,
    settings: TransportSettings,
    evaluator: &'static str,
}

impl LiveTransport {
    /// Builds a client for the given settings and trust evaluator.
    pub fn build(
        settings: &TransportSettings,
        evaluator: Arc<dyn TrustEvaluator>,
    ) -> Result<Self, FetchError> {
        let evaluator_name = evaluator.name();
        let tls = client_config(evaluator)?;

        let mut builder = Client::builder()
            .use_preconfigured_tls(tls)
            .user_agent(USER_AGENT)
            .read_timeout(settings.request_timeout)
            .timeout(settings.resource_timeout)
            .cookie_store(settings.configuration.keeps_cookies());
        if !settings.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        debug!(
            request_timeout = ?settings.request_timeout,
            resource_timeout = ?settings.resource_timeout,
            configuration = ?settings.configuration,
            evaluator = evaluator_name,
            "Live transport built"
        );

        Ok(Self {
            client,
            settings: settings.clone(),
            evaluator: evaluator_name,
        })
    }

    /// Returns the settings this transport was built with.
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Returns the name of the trust evaluator in use.
    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator
    }
}

#[async_trait]
impl Transport for LiveTransport {
    fn name(&self) -> &'static str {
        "live"
    }

    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    async fn execute(&self, request: &Request) -> RawCompletion {
        let mut builder = self
            .client
            .request(method(request.method()), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Request failed before a response arrived");
                return RawCompletion::failed(transport_error(e));
            }
        };

        let meta = response_meta(&response);
        debug!(status = meta.status, "Response received");

        match response.bytes().await {
            Ok(bytes) => RawCompletion::received(meta, bytes.to_vec()),
            Err(e) => {
                debug!(error = %e, "Reading the response body failed");
                RawCompletion {
                    response: Some(meta),
                    body: None,
                    error: Some(transport_error(e)),
                }
            }
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn response_meta(response: &reqwest::Response) -> ResponseMeta {
    response.headers().iter().fold(
        ResponseMeta::new(response.url().clone(), response.status().as_u16()),
        |meta, (name, value)| {
            meta.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
        },
    )
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Maps a `reqwest` failure onto the transport error categories.
pub(crate) fn transport_error(error: reqwest::Error) -> TransportError {
    if is_pin_rejection(&error) {
        return TransportError::pin_rejected(error.to_string()).with_source(error);
    }

    let io_kind = find_io_kind(&error);
    let kind = if error.is_timeout() || io_kind == Some(io::ErrorKind::TimedOut) {
        TransportErrorKind::TimedOut
    } else if has_tls_error(&error) {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        match io_kind {
            Some(io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown) => {
                TransportErrorKind::NotConnected
            }
            _ => TransportErrorKind::CannotConnectToHost,
        }
    } else if matches!(
        io_kind,
        Some(
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    ) {
        TransportErrorKind::ConnectionLost
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, error.to_string()).with_source(error)
}

fn find_io_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            return Some(io.kind());
        }
        current = err.source();
    }
    None
}

fn has_tls_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = err.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            if has_tls_error(inner) {
                return true;
            }
        }
        current = err.source();
    }
    false
}
