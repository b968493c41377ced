// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `NetKit` CLI - pinned HTTP requests from the command line.
//!
//! # Examples
//!
//! ```bash
//! # GET with query items
//! netkit get https://itunes.apple.com/search -q term=rust -q limit=1
//!
//! # Several URLs at once, with certificate pinning
//! netkit get https://api.example.com/a https://api.example.com/b --pin certs/api.der
//!
//! # POST a JSON body
//! netkit post https://api.example.com/token --json '{"userName":"5375"}'
//!
//! # Print the pin fingerprint of a certificate
//! netkit pin certs/api.der
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, get, pin, post};

// ============================================================================
// CLI Definition
// ============================================================================

/// `NetKit` CLI - pinned HTTP requests.
#[derive(Parser)]
#[command(name = "netkit")]
#[command(about = "HTTP requests with certificate pinning and typed errors")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Dump every request and response.
    #[arg(long, global = true)]
    pub dev: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Send GET requests.
    #[command(visible_alias = "g")]
    Get(get::GetArgs),

    /// Send a POST request.
    #[command(visible_alias = "p")]
    Post(post::PostArgs),

    /// Print public key fingerprints of DER certificates.
    Pin(pin::PinArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// At least one request failed.
    RequestFailed = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, dev: bool, quiet: bool) {
    if quiet {
        return;
    }

    let mut directives = if verbose {
        "netkit=debug,info".to_string()
    } else {
        "netkit=warn".to_string()
    };
    if dev {
        directives.push_str(",netkit::developer=info");
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(directives))
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.dev, cli.quiet);

    let result = match &cli.command {
        Commands::Get(args) => get::run(args, &cli).await,
        Commands::Post(args) => post::run(args, &cli).await,
        Commands::Pin(args) => pin::run(args, &cli),
        Commands::Config(args) => config::run(args, &cli),
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
