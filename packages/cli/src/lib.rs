//! hostforge CLI - Provision and register managed Docker hosts
//!
//! This module contains the shared CLI implementation used by the binary.

mod commands;
mod output;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use hostforge_core::{Config, config, get_version, load_config};
use tracing_subscriber::EnvFilter;

/// Provision and register managed Docker hosts
#[derive(Parser)]
#[command(name = "hostforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision and register managed Docker hosts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this config file instead of ~/.config/hostforge/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a machine
    Create(commands::CreateArgs),
    /// Serve the create endpoint over HTTP
    Serve(commands::ServeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let config = match load_cli_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let config_path = cli
                .config
                .clone()
                .or_else(config::get_config_path)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            eprintln!("{} Configuration error", style("Error:").red().bold());
            eprintln!();
            eprintln!("  {:#}", e);
            eprintln!();
            eprintln!("  Config file: {}", style(config_path).yellow());
            eprintln!();
            eprintln!(
                "  {} Check the config file for syntax errors or unknown fields.",
                style("Tip:").cyan()
            );
            std::process::exit(1);
        }
    };

    if cli.verbose > 0 {
        let storage = config
            .storage_base()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        eprintln!("{} Storage: {}", style("[info]").cyan(), storage);
    }

    match cli.command {
        Some(Commands::Create(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_create(&args, &config, cli.quiet))
        }
        Some(Commands::Serve(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_serve(&args, &config))
        }
        None => {
            if !cli.quiet {
                println!(
                    "{} {}",
                    style("hostforge").cyan().bold(),
                    style(get_version()).dim()
                );
                println!();
                println!("Run {} for available commands.", style("--help").green());
            }
            Ok(())
        }
    }
}

fn load_cli_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config_from(path),
        None => load_config(),
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flags
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
