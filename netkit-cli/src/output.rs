//! Printing request outcomes.

use serde::Serialize;

use netkit_core::NetworkingError;
use netkit_fetch::logs::render_body;

use crate::{Cli, OutputFormat};

/// One request outcome as printed in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutput {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput>,
}

/// A classified failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub pin_rejected: bool,
}

impl From<&NetworkingError> for ErrorOutput {
    fn from(error: &NetworkingError) -> Self {
        Self {
            title: error.title().to_string(),
            message: error.to_string(),
            status: error.status_code(),
            pin_rejected: error
                .transport_error()
                .is_some_and(netkit_core::TransportError::is_pin_rejection),
        }
    }
}

/// Prints one outcome. `body` is the raw body on success.
pub fn print_outcome(cli: &Cli, url: &str, outcome: &Result<Vec<u8>, NetworkingError>) {
    match cli.format {
        OutputFormat::Text => print_text(url, outcome),
        OutputFormat::Json => {
            let output = RequestOutput {
                url: url.to_string(),
                ok: outcome.is_ok(),
                body: outcome.as_ref().ok().map(|body| {
                    serde_json::from_slice(body).unwrap_or_else(|_| {
                        serde_json::Value::String(String::from_utf8_lossy(body).into_owned())
                    })
                }),
                error: outcome.as_ref().err().map(ErrorOutput::from),
            };
            let json = if cli.pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            match json {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error: cannot encode output: {e}"),
            }
        }
    }
}

fn print_text(url: &str, outcome: &Result<Vec<u8>, NetworkingError>) {
    println!("{url}");
    println!("{}", "─".repeat(40));
    match outcome {
        Ok(body) => println!("{}", render_body(body)),
        Err(error) => {
            println!("✗ {}: {error}", error.title());
            if let Some(cause) = error.transport_error() {
                if cause.is_pin_rejection() {
                    println!("  The server's public key matches none of the pinned certificates.");
                }
            }
            if let Some(body) = error.body().filter(|body| !body.is_empty()) {
                println!("{}", render_body(body));
            }
        }
    }
    println!();
}
