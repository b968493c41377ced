//! Config command - inspect and create the configuration file.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use netkit_fetch::SessionConfig;
use tracing::info;

use super::load_config;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Write a configuration file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli)?,
        ConfigAction::Path => show_path(cli),
        ConfigAction::Init { force } => init_config(cli, *force)?,
    }
    Ok(ExitCode::Success)
}

fn show_config(cli: &Cli) -> Result<()> {
    let (config, path) = load_config(cli)?;

    match cli.format {
        OutputFormat::Text => {
            println!("NetKit Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("File:             {}", path.display());
            println!("Request timeout:  {}s", config.request_timeout_secs);
            println!("Resource timeout: {}s", config.resource_timeout_secs);
            println!("Configuration:    {:?}", config.configuration);
            println!("Trust all peers:  {}", config.trust_all_peers);
            println!("Developer mode:   {}", config.developer_mode);
            println!("System proxy:     {}", config.system_proxy);
            println!("Pinned certificates:");
            if config.pinned_certificates.is_empty() {
                println!("  (none, default verification)");
            }
            for pin in &config.pinned_certificates {
                println!("  • {}", pin.display());
            }
        }
        OutputFormat::Json => {
            let json = if cli.pretty {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_json::to_string(&config)?
            };
            println!("{json}");
        }
    }

    Ok(())
}

fn show_path(cli: &Cli) {
    let path = cli.config.clone().unwrap_or_else(SessionConfig::default_path);
    match cli.format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "config_file": path.display().to_string() }));
        }
    }
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(SessionConfig::default_path);
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }

    SessionConfig::default().save_to(&path)?;
    info!(path = %path.display(), "Configuration initialized");
    println!("Wrote {}", path.display());
    Ok(())
}
