//! Developer mode request and response dumps.
//!
//! Emitted under the `netkit::developer` target so they can be filtered
//! separately from the regular request flow.

use netkit_core::{NetworkingError, RawCompletion, Request, TaskId};
use tracing::{info, warn};

/// Renders a body for humans: pretty JSON if it parses, text otherwise.
pub fn render_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

pub(crate) fn request(id: TaskId, request: &Request) {
    info!(
        target: "netkit::developer",
        task = %id,
        method = %request.method(),
        endpoint = %request.url(),
        headers = ?request.headers(),
        body = %request.body().map(render_body).unwrap_or_default(),
        "REQUEST"
    );
}

pub(crate) fn response(id: TaskId, completion: &RawCompletion) {
    info!(
        target: "netkit::developer",
        task = %id,
        status = ?completion.response.as_ref().map(|response| response.status),
        headers = ?completion.response.as_ref().map(|response| &response.headers),
        body = %completion.body.as_deref().map(render_body).unwrap_or_default(),
        "RESPONSE"
    );
}

pub(crate) fn failure(id: TaskId, error: &NetworkingError) {
    warn!(
        target: "netkit::developer",
        task = %id,
        title = error.title(),
        error = %error,
        "ERROR"
    );
}
