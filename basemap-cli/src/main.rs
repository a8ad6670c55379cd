//! Basemap CLI - Command-line interface
//!
//! Renders web basemap composites for a map extent and manages the basemap
//! configuration file.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use basemap::logging::init_logging;
use clap::{Parser, Subcommand};
use console::style;

use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "basemap", version, about = "Web basemap tiles, reprojected and stitched")]
struct Cli {
    /// Configuration file (defaults to ~/.config/basemap/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a basemap composite to a PNG file
    Render(RenderArgs),

    /// List available tile providers
    Providers,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::load_config(cli.config.as_deref())?;

    let mut logging = config.config.logging();
    match cli.verbose {
        0 => {}
        1 => logging.level = "debug".to_string(),
        _ => logging.level = "trace".to_string(),
    }
    let _guard = init_logging(&logging)?;

    match cli.command {
        Commands::Render(args) => commands::render::run(args, config),
        Commands::Providers => commands::providers::run(),
        Commands::Config(command) => {
            commands::config::run(command, cli.config.as_deref(), &config)
        }
    }
}
