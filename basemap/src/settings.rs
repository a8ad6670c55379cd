//! Project settings persistence
//!
//! The basemap stores two string values per project: the selected provider
//! and the opacity. [`ProjectSettings`] abstracts where they live.
//! [`IniProjectSettings`] keeps them in a section of an INI project file;
//! [`MemorySettings`] keeps them in a map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ini::Ini;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// INI section holding project settings.
pub const PROJECT_SECTION: &str = "project";

/// Errors from reading or writing project settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Named string settings attached to the current project.
pub trait ProjectSettings: Send + Sync {
    /// Reads a value; `Ok(None)` when the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError>;

    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Settings held in memory.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl ProjectSettings for MemorySettings {
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings stored in the `[project]` section of an INI file.
///
/// The file is read on every access and rewritten on every write, keeping
/// other sections intact. A missing file reads as empty.
#[derive(Debug)]
pub struct IniProjectSettings {
    path: PathBuf,
    section: String,
    lock: Mutex<()>,
}

impl IniProjectSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            section: PROJECT_SECTION.to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Ini, SettingsError> {
        if !self.path.exists() {
            return Ok(Ini::new());
        }
        Ini::load_from_file(&self.path).map_err(|e| match e {
            ini::Error::Io(source) => SettingsError::Io {
                path: self.path.clone(),
                source,
            },
            ini::Error::Parse(err) => SettingsError::Parse {
                path: self.path.clone(),
                message: err.to_string(),
            },
        })
    }
}

impl ProjectSettings for IniProjectSettings {
    fn read(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let _guard = self.lock.lock();
        let ini = self.load()?;
        Ok(ini
            .get_from(Some(self.section.as_str()), key)
            .map(str::to_string))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let _guard = self.lock.lock();
        let mut ini = self.load()?;
        ini.with_section(Some(self.section.as_str()))
            .set(key, value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        ini.write_to_file(&self.path)
            .map_err(|source| SettingsError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), key, value, "Project setting written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_settings() {
        let settings = MemorySettings::new();
        assert_eq!(settings.read("a").unwrap(), None);
        settings.write("a", "1").unwrap();
        settings.write("a", "2").unwrap();
        assert_eq!(settings.read("a").unwrap(), Some("2".to_string()));
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn test_ini_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let settings = IniProjectSettings::new(dir.path().join("project.ini"));
        assert_eq!(settings.read("anything").unwrap(), None);
    }

    #[test]
    fn test_ini_round_trip_and_preserves_other_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("project.ini");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[other]\nkeep = yes\n").unwrap();

        let settings = IniProjectSettings::new(&path);
        settings.write("Basemap_Opacity", "75").unwrap();

        let reopened = IniProjectSettings::new(&path);
        assert_eq!(
            reopened.read("Basemap_Opacity").unwrap(),
            Some("75".to_string())
        );

        let raw = Ini::load_from_file(&path).unwrap();
        assert_eq!(raw.get_from(Some("other"), "keep"), Some("yes"));
    }

    #[test]
    fn test_ini_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("project.ini");
        let settings = IniProjectSettings::new(&path);
        settings.write("k", "v").unwrap();
        assert!(path.exists());
    }
}
