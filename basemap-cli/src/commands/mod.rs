//! CLI subcommands.

pub mod config;
pub mod providers;
pub mod render;

use std::path::Path;

use basemap::config::{BasemapConfig, ConfigFile};

use crate::error::CliError;

/// Loads `path`, or the default config file when none is given. A file
/// that does not exist yet yields the defaults so `config init` can create
/// it.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) if path.exists() => Ok(ConfigFile::load(path)?),
        Some(_) => Ok(ConfigFile {
            config: BasemapConfig::default(),
        }),
        None => Ok(ConfigFile::load_default()?),
    }
}
