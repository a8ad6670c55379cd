//! Configuration
//!
//! [`BasemapConfig`] carries every tunable of the pipeline with sensible
//! defaults. [`ConfigFile`] reads and writes it as an INI file, by default at
//! `~/.config/basemap/config.ini`:
//!
//! ```ini
//! [basemap]
//! provider = OpenStreetMap
//! opacity = 100
//! settings_prefix = Basemap
//!
//! [tiles]
//! tile_size = 256
//! min_zoom = 0
//! max_zoom = 19
//!
//! [download]
//! timeout = 30
//! user_agent = basemap/0.1.0
//! max_concurrent = 8
//! max_tiles = 256
//!
//! [cache]
//! memory_size = 64MB
//!
//! [logging]
//! level = info
//! file = /tmp/basemap.log
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::coord::{DEFAULT_TILE_SIZE, MAX_ZOOM};
use crate::logging::LoggingConfig;
use crate::provider::{
    DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_TILES_PER_REQUEST, DEFAULT_TILE_CACHE_BYTES,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

/// Prefix used for persisted project settings keys.
pub const DEFAULT_SETTINGS_PREFIX: &str = "Basemap";

/// Errors from loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for [{section}] {key} = {value:?}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BasemapConfig {
    /// Provider enabled at startup, `None` for no basemap.
    pub provider: Option<String>,
    /// Opacity 0-100 applied when no project setting overrides it.
    pub opacity: u8,
    pub settings_prefix: String,
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub max_concurrent_downloads: usize,
    pub max_tiles_per_request: usize,
    pub tile_cache_bytes: u64,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for BasemapConfig {
    fn default() -> Self {
        Self {
            provider: None,
            opacity: 100,
            settings_prefix: DEFAULT_SETTINGS_PREFIX.to_string(),
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: 0,
            max_zoom: 19,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_tiles_per_request: DEFAULT_MAX_TILES_PER_REQUEST,
            tile_cache_bytes: DEFAULT_TILE_CACHE_BYTES,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl BasemapConfig {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity.min(100);
        self
    }

    pub fn with_settings_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings_prefix = prefix.into();
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max;
        self
    }

    pub fn with_max_tiles_per_request(mut self, max: usize) -> Self {
        self.max_tiles_per_request = max;
        self
    }

    pub fn with_tile_cache_bytes(mut self, bytes: u64) -> Self {
        self.tile_cache_bytes = bytes;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            file: self.log_file.clone(),
        }
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |section: &str, key: &str, value: String, reason: &str| {
            Err(ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value,
                reason: reason.to_string(),
            })
        };

        if self.opacity > 100 {
            return invalid("basemap", "opacity", self.opacity.to_string(), "must be 0-100");
        }
        if self.tile_size == 0 {
            return invalid("tiles", "tile_size", "0".into(), "must be positive");
        }
        if self.max_zoom > MAX_ZOOM {
            return invalid(
                "tiles",
                "max_zoom",
                self.max_zoom.to_string(),
                "exceeds the highest supported zoom",
            );
        }
        if self.min_zoom > self.max_zoom {
            return invalid(
                "tiles",
                "min_zoom",
                self.min_zoom.to_string(),
                "must not exceed max_zoom",
            );
        }
        if self.max_concurrent_downloads == 0 {
            return invalid("download", "max_concurrent", "0".into(), "must be positive");
        }
        if self.max_tiles_per_request == 0 {
            return invalid("download", "max_tiles", "0".into(), "must be positive");
        }
        Ok(())
    }
}

/// INI-backed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub config: BasemapConfig,
}

impl ConfigFile {
    /// `<config dir>/basemap/config.ini`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("basemap").join("config.ini"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads the default file, falling back to defaults when it is absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self {
                config: BasemapConfig::default(),
            })
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;
        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(Self { config })
    }

    pub fn from_ini(ini: &Ini) -> Result<BasemapConfig, ConfigError> {
        let mut config = BasemapConfig::default();

        if let Some(provider) = ini.get_from(Some("basemap"), "provider") {
            let provider = provider.trim();
            config.provider = if provider.is_empty() || provider.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(provider.to_string())
            };
        }
        if let Some(v) = parse_value(ini, "basemap", "opacity")? {
            config.opacity = v;
        }
        if let Some(prefix) = ini.get_from(Some("basemap"), "settings_prefix") {
            config.settings_prefix = prefix.trim().to_string();
        }

        if let Some(v) = parse_value(ini, "tiles", "tile_size")? {
            config.tile_size = v;
        }
        if let Some(v) = parse_value(ini, "tiles", "min_zoom")? {
            config.min_zoom = v;
        }
        if let Some(v) = parse_value(ini, "tiles", "max_zoom")? {
            config.max_zoom = v;
        }

        if let Some(secs) = parse_value::<u64>(ini, "download", "timeout")? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = ini.get_from(Some("download"), "user_agent") {
            config.user_agent = agent.trim().to_string();
        }
        if let Some(v) = parse_value(ini, "download", "max_concurrent")? {
            config.max_concurrent_downloads = v;
        }
        if let Some(v) = parse_value(ini, "download", "max_tiles")? {
            config.max_tiles_per_request = v;
        }

        if let Some(size) = ini.get_from(Some("cache"), "memory_size") {
            config.tile_cache_bytes = parse_size(size).map_err(|reason| ConfigError::InvalidValue {
                section: "cache".into(),
                key: "memory_size".into(),
                value: size.to_string(),
                reason,
            })?;
        }

        if let Some(level) = ini.get_from(Some("logging"), "level") {
            config.log_level = level.trim().to_string();
        }
        if let Some(file) = ini.get_from(Some("logging"), "file") {
            let file = file.trim();
            if !file.is_empty() {
                config.log_file = Some(PathBuf::from(file));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_ini(&self) -> Ini {
        let c = &self.config;
        let mut ini = Ini::new();
        ini.with_section(Some("basemap"))
            .set("provider", c.provider.as_deref().unwrap_or("none"))
            .set("opacity", c.opacity.to_string())
            .set("settings_prefix", c.settings_prefix.as_str());
        ini.with_section(Some("tiles"))
            .set("tile_size", c.tile_size.to_string())
            .set("min_zoom", c.min_zoom.to_string())
            .set("max_zoom", c.max_zoom.to_string());
        ini.with_section(Some("download"))
            .set("timeout", c.http_timeout.as_secs().to_string())
            .set("user_agent", c.user_agent.as_str())
            .set("max_concurrent", c.max_concurrent_downloads.to_string())
            .set("max_tiles", c.max_tiles_per_request.to_string());
        ini.with_section(Some("cache"))
            .set("memory_size", c.tile_cache_bytes.to_string());
        let mut logging = ini.with_section(Some("logging"));
        logging.set("level", c.log_level.as_str());
        if let Some(file) = &c.log_file {
            logging.set("file", file.display().to_string());
        }
        ini
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn parse_value<T>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match ini.get_from(Some(section), key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Parses a byte size such as `1048576`, `512KB`, `64MB` or `2GB`.
pub fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = value.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = value.strip_suffix('B') {
        (n, 1)
    } else {
        (value.as_str(), 1)
    };

    let number: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a size", value))?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("'{}' is too large", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(BasemapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BasemapConfig::default()
            .with_provider("ESRI Satellite")
            .with_opacity(250)
            .with_zoom_range(2, 12)
            .with_max_concurrent_downloads(4);
        assert_eq!(config.provider.as_deref(), Some("ESRI Satellite"));
        assert_eq!(config.opacity, 100);
        assert_eq!((config.min_zoom, config.max_zoom), (2, 12));
        assert_eq!(config.max_concurrent_downloads, 4);
    }

    #[test]
    fn test_validate_rejects_inverted_zoom() {
        let config = BasemapConfig::default().with_zoom_range(10, 5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "min_zoom"
        ));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Ok(1024));
        assert_eq!(parse_size("2kb"), Ok(2048));
        assert_eq!(parse_size("64MB"), Ok(64 * 1024 * 1024));
        assert_eq!(parse_size(" 1 GB "), Ok(1024 * 1024 * 1024));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("basemap").join("config.ini");

        let file = ConfigFile {
            config: BasemapConfig::default()
                .with_provider("OpenStreetMap")
                .with_opacity(40)
                .with_tile_cache_bytes(1024)
                .with_log_file("/tmp/basemap.log"),
        };
        file.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_invalid_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[tiles]\nmax_zoom = high\n").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref section, .. } if section == "tiles"));
    }

    #[test]
    fn test_none_provider() {
        let mut ini = Ini::new();
        ini.with_section(Some("basemap")).set("provider", "none");
        let config = ConfigFile::from_ini(&ini).unwrap();
        assert!(config.provider.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigFile::load(Path::new("/nonexistent/basemap/config.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
