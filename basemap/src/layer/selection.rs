//! Persisted provider selection and opacity.

use crate::provider::NO_PROVIDER;
use crate::settings::{ProjectSettings, SettingsError};

/// Key holding the selected provider name.
pub fn basemap_name_key(prefix: &str) -> String {
    format!("{}_BasemapName", prefix)
}

/// Key holding the opacity as an integer string.
pub fn opacity_key(prefix: &str) -> String {
    format!("{}_Opacity", prefix)
}

/// Which basemap is shown and how opaque it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasemapSelection {
    /// Provider name, `None` when no basemap is selected.
    pub provider: Option<String>,
    /// 0-100
    pub opacity: u8,
}

impl Default for BasemapSelection {
    fn default() -> Self {
        Self {
            provider: None,
            opacity: 100,
        }
    }
}

impl BasemapSelection {
    pub fn new(provider: impl Into<String>, opacity: u8) -> Self {
        Self {
            provider: Some(provider.into()),
            opacity: opacity.min(100),
        }
    }

    pub fn is_none(&self) -> bool {
        self.provider.is_none()
    }

    /// Provider name as persisted, using the `"none"` sentinel.
    pub fn provider_setting(&self) -> &str {
        self.provider.as_deref().unwrap_or(NO_PROVIDER)
    }

    /// Reads the selection. Missing keys fall back to the defaults; an
    /// opacity that is not an integer in 0..=100 is an error.
    pub fn load(settings: &dyn ProjectSettings, prefix: &str) -> Result<Self, SettingsError> {
        let provider = settings
            .read(&basemap_name_key(prefix))?
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case(NO_PROVIDER));

        let key = opacity_key(prefix);
        let opacity = match settings.read(&key)? {
            None => 100,
            Some(value) => match value.trim().parse::<u8>() {
                Ok(opacity) if opacity <= 100 => opacity,
                _ => return Err(SettingsError::InvalidValue { key, value }),
            },
        };

        Ok(Self { provider, opacity })
    }

    pub fn save(&self, settings: &dyn ProjectSettings, prefix: &str) -> Result<(), SettingsError> {
        settings.write(&basemap_name_key(prefix), self.provider_setting())?;
        settings.write(&opacity_key(prefix), &self.opacity.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn test_keys() {
        assert_eq!(basemap_name_key("Basemap"), "Basemap_BasemapName");
        assert_eq!(opacity_key("Basemap"), "Basemap_Opacity");
    }

    #[test]
    fn test_round_trip() {
        let settings = MemorySettings::new();
        let selection = BasemapSelection::new("OpenStreetMap", 60);
        selection.save(&settings, "Basemap").unwrap();

        assert_eq!(
            settings.read("Basemap_BasemapName").unwrap().as_deref(),
            Some("OpenStreetMap")
        );
        assert_eq!(
            BasemapSelection::load(&settings, "Basemap").unwrap(),
            selection
        );
    }

    #[test]
    fn test_none_sentinel() {
        let settings = MemorySettings::new();
        BasemapSelection::default().save(&settings, "P").unwrap();
        assert_eq!(
            settings.read("P_BasemapName").unwrap().as_deref(),
            Some("none")
        );
        assert!(BasemapSelection::load(&settings, "P").unwrap().is_none());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings = MemorySettings::new();
        assert_eq!(
            BasemapSelection::load(&settings, "P").unwrap(),
            BasemapSelection::default()
        );
    }

    #[test]
    fn test_invalid_opacity() {
        let settings = MemorySettings::new();
        settings.write("P_Opacity", "150").unwrap();
        assert!(matches!(
            BasemapSelection::load(&settings, "P"),
            Err(SettingsError::InvalidValue { .. })
        ));
        settings.write("P_Opacity", "abc").unwrap();
        assert!(BasemapSelection::load(&settings, "P").is_err());
    }
}
