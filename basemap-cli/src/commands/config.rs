//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use basemap::config::ConfigFile;
use clap::Subcommand;
use console::style;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(
    command: ConfigCommands,
    path: Option<&Path>,
    config: &ConfigFile,
) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => ConfigFile::default_path()?,
    };

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            print_config(config);
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    ConfigFile {
        config: Default::default(),
    }
    .save(path)?;
    println!("{} Wrote {}", style("✓").green().bold(), path.display());
    Ok(())
}

fn print_config(file: &ConfigFile) {
    let c = &file.config;
    let row = |key: &str, value: String| println!("  {:<24} {}", key, value);

    println!("{}", style("[basemap]").bold());
    row("provider", c.provider.clone().unwrap_or_else(|| "none".into()));
    row("opacity", c.opacity.to_string());
    row("settings_prefix", c.settings_prefix.clone());
    println!("{}", style("[tiles]").bold());
    row("tile_size", c.tile_size.to_string());
    row("zoom", format!("{}-{}", c.min_zoom, c.max_zoom));
    println!("{}", style("[download]").bold());
    row("timeout", format!("{}s", c.http_timeout.as_secs()));
    row("user_agent", c.user_agent.clone());
    row("max_concurrent", c.max_concurrent_downloads.to_string());
    row("max_tiles", c.max_tiles_per_request.to_string());
    println!("{}", style("[cache]").bold());
    row("memory_size", format!("{} bytes", c.tile_cache_bytes));
    println!("{}", style("[logging]").bold());
    row("level", c.log_level.clone());
    row(
        "file",
        c.log_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stderr only)".into()),
    );
}
