//! CLI command implementations.

pub mod config;
pub mod get;
pub mod pin;
pub mod post;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use futures::future::join_all;
use netkit_core::{NetworkingError, Request};
use netkit_fetch::{ConfigurationKind, Session, SessionConfig, SessionSettings};
use tracing::debug;

use crate::output::print_outcome;
use crate::{Cli, ExitCode};

/// Options shared by every command that sends requests.
#[derive(Args, Debug, Default)]
pub struct RequestOptions {
    /// DER certificate whose public key is pinned (repeatable).
    #[arg(long = "pin", value_name = "CERT")]
    pub pins: Vec<PathBuf>,

    /// Accept any TLS certificate. Insecure.
    #[arg(long)]
    pub trust_all: bool,

    /// Timeout in seconds, applied to both idle and total time.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not keep cookies between requests.
    #[arg(long)]
    pub ephemeral: bool,

    /// Extra header as `Name: value` (repeatable).
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    pub headers: Vec<String>,
}

impl RequestOptions {
    /// Applies the header options to a request.
    pub fn apply_headers(&self, request: Request) -> Result<Request> {
        self.headers.iter().try_fold(request, |request, header| {
            let (name, value) = header
                .split_once(':')
                .with_context(|| format!("Header must look like `Name: value`: {header}"))?;
            Ok(request.with_header(name.trim(), value.trim()))
        })
    }
}

/// Loads the configuration file named on the command line, or the default.
pub fn load_config(cli: &Cli) -> Result<(SessionConfig, PathBuf)> {
    let path = cli.config.clone().unwrap_or_else(SessionConfig::default_path);
    let config = SessionConfig::load_from(&path)
        .with_context(|| format!("Cannot load configuration from {}", path.display()))?;
    Ok((config, path))
}

/// Builds a session from the configuration file and command line options.
pub fn build_session(cli: &Cli, options: &RequestOptions) -> Result<Session> {
    let (config, path) = load_config(cli)?;
    let mut settings: SessionSettings = config.into_settings(path.parent());

    if !options.pins.is_empty() {
        settings = settings.with_pinned_certificates(options.pins.iter().cloned());
    }
    if let Some(secs) = options.timeout {
        settings = settings.with_timeouts(Duration::from_secs(secs), Duration::from_secs(secs));
    }
    if options.ephemeral {
        settings = settings.with_configuration(ConfigurationKind::Ephemeral);
    }
    if options.trust_all {
        settings = settings.with_trust_all_peers();
    }
    let developer_mode = settings.developer_mode || cli.dev;
    settings = settings
        .with_developer_mode(developer_mode)
        .with_interception(false);

    debug!(?settings, "Building session");
    Session::new(settings).context("Cannot create session")
}

/// Dispatches every request concurrently and prints the outcomes in order.
pub async fn send_all(cli: &Cli, session: &Session, requests: Vec<Request>) -> ExitCode {
    let urls: Vec<String> = requests.iter().map(|r| r.url().to_string()).collect();
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| session.dispatch_bytes(request))
        .collect();
    debug!(in_flight = session.in_flight_count(), "Requests dispatched");

    let outcomes: Vec<Result<Vec<u8>, NetworkingError>> = join_all(handles).await;
    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    for (url, outcome) in urls.iter().zip(&outcomes) {
        print_outcome(cli, url, outcome);
    }

    if failed == 0 {
        ExitCode::Success
    } else {
        if !cli.quiet {
            eprintln!("{failed} of {} requests failed", outcomes.len());
        }
        ExitCode::RequestFailed
    }
}

/// Parses `key=value` pairs.
pub fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .with_context(|| format!("Expected `key=value`, got `{pair}`"))
        })
        .collect()
}

/// Returns the file name part of a path for multipart uploads.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "file".to_string(), |name| name.to_string_lossy().into_owned())
}
