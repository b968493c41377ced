//! Post command - send a POST request with a JSON, form or multipart body.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use netkit_core::{HttpMethod, MultipartFile, Request};
use url::Url;

use super::{RequestOptions, build_session, file_name, parse_pairs, send_all};
use crate::{Cli, ExitCode};

/// Arguments for the post command.
#[derive(Args)]
pub struct PostArgs {
    /// URL to post to.
    pub url: String,

    /// JSON body.
    #[arg(long, conflicts_with_all = ["form", "file"])]
    pub json: Option<String>,

    /// Form field as `key=value` (repeatable). Sent URL-encoded, or as
    /// multipart fields when files are attached.
    #[arg(long, value_name = "KEY=VALUE")]
    pub form: Vec<String>,

    /// File to upload as multipart (repeatable).
    #[arg(long, value_name = "PATH")]
    pub file: Vec<PathBuf>,

    /// Multipart field name for uploaded files.
    #[arg(long, default_value = "file")]
    pub file_field: String,

    /// MIME type of uploaded files.
    #[arg(long, default_value = "application/octet-stream")]
    pub mime_type: String,

    #[command(flatten)]
    pub options: RequestOptions,
}

/// Runs the post command.
pub async fn run(args: &PostArgs, cli: &Cli) -> Result<ExitCode> {
    let request = build_request(args)?;
    let request = args.options.apply_headers(request)?;

    let session = build_session(cli, &args.options)?;
    Ok(send_all(cli, &session, vec![request]).await)
}

fn build_request(args: &PostArgs) -> Result<Request> {
    let fields = parse_pairs(&args.form)?;

    if let Some(json) = &args.json {
        let value: serde_json::Value =
            serde_json::from_str(json).context("--json is not valid JSON")?;
        return Ok(Request::post_json(&args.url, &value)?);
    }

    if !args.file.is_empty() {
        let files = args
            .file
            .iter()
            .map(|path| {
                let data = std::fs::read(path)
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                Ok(MultipartFile::new(file_name(path), args.mime_type.clone(), data))
            })
            .collect::<Result<Vec<_>>>()?;
        let url = Url::parse(&args.url).with_context(|| format!("Invalid URL: {}", args.url))?;
        return Ok(Request::new(HttpMethod::Post, url).with_multipart(
            fields.iter().map(|(k, v)| (k, v)),
            &args.file_field,
            &files,
        ));
    }

    if fields.is_empty() {
        bail!("Nothing to send: use --json, --form or --file");
    }
    Ok(Request::post_form(&args.url, fields.iter().map(|(k, v)| (k, v)))?)
}
