//! Pin command - print the pin fingerprint of certificates.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use netkit_fetch::PinnedCertificate;

use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the pin command.
#[derive(Args)]
pub struct PinArgs {
    /// DER encoded certificate files.
    #[arg(required = true)]
    pub certificates: Vec<PathBuf>,
}

/// Runs the pin command.
pub fn run(args: &PinArgs, cli: &Cli) -> Result<ExitCode> {
    let mut entries = Vec::with_capacity(args.certificates.len());
    for path in &args.certificates {
        let pin = PinnedCertificate::load(path)?;
        entries.push((path.display().to_string(), pin.fingerprint()));
    }

    match cli.format {
        OutputFormat::Text => {
            for (path, fingerprint) in &entries {
                println!("{fingerprint}  {path}");
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = entries
                .iter()
                .map(|(path, fingerprint)| {
                    serde_json::json!({ "path": path, "fingerprint": fingerprint })
                })
                .collect();
            let json = if cli.pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{json}");
        }
    }

    Ok(ExitCode::Success)
}
