//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use basemap::config::ConfigError;
use basemap::layer::BasemapError;
use basemap::logging::LoggingError;
use basemap::plugin::PluginError;
use basemap::provider::ProviderError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or saved
    Config(String),
    /// A command-line value could not be understood
    InvalidArgument(String),
    /// The basemap could not be set up
    Basemap(String),
    /// The render job did not produce a composite
    Render(String),
    /// Writing the output image failed
    Output { path: PathBuf, message: String },
    /// Logging could not be initialised
    Logging(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Basemap(msg) => write!(f, "Basemap error: {}", msg),
            CliError::Render(msg) => write!(f, "Render failed: {}", msg),
            CliError::Output { path, message } => {
                write!(f, "Failed to write {}: {}", path.display(), message)
            }
            CliError::Logging(msg) => write!(f, "Logging setup failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<BasemapError> for CliError {
    fn from(err: BasemapError) -> Self {
        CliError::Basemap(err.to_string())
    }
}

impl From<PluginError> for CliError {
    fn from(err: PluginError) -> Self {
        CliError::Basemap(err.to_string())
    }
}

impl From<ProviderError> for CliError {
    fn from(err: ProviderError) -> Self {
        CliError::Basemap(err.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(err: LoggingError) -> Self {
        CliError::Logging(err.to_string())
    }
}
