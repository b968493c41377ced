//! Get command - send one or more GET requests.

use anyhow::Result;
use clap::Args;
use netkit_core::Request;
use tracing::info;

use super::{RequestOptions, build_session, parse_pairs, send_all};
use crate::{Cli, ExitCode};

/// Arguments for the get command.
#[derive(Args)]
pub struct GetArgs {
    /// URLs to fetch; all are sent concurrently.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Query item as `key=value`, appended to every URL (repeatable).
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    #[command(flatten)]
    pub options: RequestOptions,
}

/// Runs the get command.
pub async fn run(args: &GetArgs, cli: &Cli) -> Result<ExitCode> {
    let query = parse_pairs(&args.query)?;
    let requests = args
        .urls
        .iter()
        .map(|url| {
            let request = Request::get(url)?.with_query(query.iter().map(|(k, v)| (k, v)));
            args.options.apply_headers(request)
        })
        .collect::<Result<Vec<_>>>()?;

    let session = build_session(cli, &args.options)?;
    info!(requests = requests.len(), "Sending GET requests");
    Ok(send_all(cli, &session, requests).await)
}
