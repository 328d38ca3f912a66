//! TickerLens CLI.
//!
//! Offline inspection of what the library leaves on disk: theme catalog
//! snapshots, durable cache documents and the configuration file. No
//! command talks to an upstream.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tickerlens::config::ConfigFile;
use tickerlens::logging::{init_logging, LogConfig};
use tracing::debug;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::themes::ThemesAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tickerlens", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect theme catalog snapshots
    Themes {
        #[command(subcommand)]
        action: ThemesAction,
    },
    /// Inspect or clear the durable cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init(verbose: bool) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let level = if verbose {
        "debug".to_string()
    } else {
        // Operator output goes to stdout; keep library chatter down.
        match config.logging.level.as_str() {
            "info" => "warn".to_string(),
            other => other.to_string(),
        }
    };
    // The guard is only returned for file logging, which the CLI never
    // enables.
    let _ = init_logging(&LogConfig::new(level).without_file())?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    init(cli.verbose)?;
    debug!(version = tickerlens::VERSION, command = ?cli.command, "tickerlens cli starting");
    match cli.command {
        Commands::Themes { action } => commands::themes::run(action),
        Commands::Cache { action } => commands::cache::run(action),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
