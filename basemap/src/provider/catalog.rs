//! Catalog of XYZ tile providers.
//!
//! Each entry knows how to turn a tile address into a URL. Templates use the
//! usual placeholders: `{x}` column, `{y}` row, `{z}` zoom and `{s}` for a
//! rotating subdomain.

use std::fmt;

use crate::coord::TileCoord;

/// Sentinel stored in settings when no provider is selected.
pub const NO_PROVIDER: &str = "none";

/// A web tile provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// OpenStreetMap standard tiles
    OpenStreetMap,
    /// Esri World Imagery satellite basemap
    ArcGisWorldImagery,
    /// Esri World Topographic Map
    ArcGisWorldTopo,
    /// Google satellite tiles
    GoogleSatellite,
    /// Google road map tiles
    GoogleRoads,
    /// CARTO light basemap
    CartoPositron,
    /// User-supplied XYZ template
    Custom {
        name: String,
        url_template: String,
        min_zoom: u8,
        max_zoom: u8,
    },
}

impl ProviderConfig {
    /// All built-in providers, in display order.
    pub fn builtin() -> Vec<ProviderConfig> {
        vec![
            ProviderConfig::OpenStreetMap,
            ProviderConfig::ArcGisWorldImagery,
            ProviderConfig::ArcGisWorldTopo,
            ProviderConfig::GoogleSatellite,
            ProviderConfig::GoogleRoads,
            ProviderConfig::CartoPositron,
        ]
    }

    /// Finds a built-in provider by display name or id, ignoring case.
    ///
    /// Returns `None` for the [`NO_PROVIDER`] sentinel and for unknown names.
    pub fn from_name(name: &str) -> Option<ProviderConfig> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(NO_PROVIDER) {
            return None;
        }
        Self::builtin()
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name) || p.id().eq_ignore_ascii_case(name))
    }

    /// Human-readable name, also used as the persisted selection.
    pub fn name(&self) -> &str {
        match self {
            ProviderConfig::OpenStreetMap => "OpenStreetMap",
            ProviderConfig::ArcGisWorldImagery => "ESRI Satellite",
            ProviderConfig::ArcGisWorldTopo => "ESRI Topo",
            ProviderConfig::GoogleSatellite => "Google Satellite",
            ProviderConfig::GoogleRoads => "Google Roads",
            ProviderConfig::CartoPositron => "CARTO Positron",
            ProviderConfig::Custom { name, .. } => name,
        }
    }

    /// Short identifier, used for cache keys and on the command line.
    pub fn id(&self) -> &str {
        match self {
            ProviderConfig::OpenStreetMap => "osm",
            ProviderConfig::ArcGisWorldImagery => "esri-imagery",
            ProviderConfig::ArcGisWorldTopo => "esri-topo",
            ProviderConfig::GoogleSatellite => "google-satellite",
            ProviderConfig::GoogleRoads => "google-roads",
            ProviderConfig::CartoPositron => "carto-positron",
            ProviderConfig::Custom { name, .. } => name,
        }
    }

    pub fn url_template(&self) -> &str {
        match self {
            ProviderConfig::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            ProviderConfig::ArcGisWorldImagery => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
            ProviderConfig::ArcGisWorldTopo => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer/tile/{z}/{y}/{x}"
            }
            ProviderConfig::GoogleSatellite => "https://mt{s}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}",
            ProviderConfig::GoogleRoads => "https://mt{s}.google.com/vt/lyrs=m&x={x}&y={y}&z={z}",
            ProviderConfig::CartoPositron => {
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png"
            }
            ProviderConfig::Custom { url_template, .. } => url_template,
        }
    }

    /// Subdomains substituted for `{s}`, rotated per tile.
    pub fn subdomains(&self) -> &'static [&'static str] {
        match self {
            ProviderConfig::GoogleSatellite | ProviderConfig::GoogleRoads => &["0", "1", "2", "3"],
            ProviderConfig::CartoPositron => &["a", "b", "c", "d"],
            _ => &[],
        }
    }

    pub fn min_zoom(&self) -> u8 {
        match self {
            ProviderConfig::Custom { min_zoom, .. } => *min_zoom,
            _ => 0,
        }
    }

    pub fn max_zoom(&self) -> u8 {
        match self {
            ProviderConfig::OpenStreetMap => 19,
            ProviderConfig::ArcGisWorldImagery | ProviderConfig::ArcGisWorldTopo => 19,
            ProviderConfig::GoogleSatellite | ProviderConfig::GoogleRoads => 20,
            ProviderConfig::CartoPositron => 20,
            ProviderConfig::Custom { max_zoom, .. } => *max_zoom,
        }
    }

    pub fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom() && zoom <= self.max_zoom()
    }

    pub fn attribution(&self) -> &str {
        match self {
            ProviderConfig::OpenStreetMap => "© OpenStreetMap contributors",
            ProviderConfig::ArcGisWorldImagery | ProviderConfig::ArcGisWorldTopo => "© Esri",
            ProviderConfig::GoogleSatellite | ProviderConfig::GoogleRoads => "© Google",
            ProviderConfig::CartoPositron => "© OpenStreetMap contributors © CARTO",
            ProviderConfig::Custom { .. } => "",
        }
    }

    /// Builds the request URL for a tile.
    pub fn tile_url(&self, tile: &TileCoord) -> String {
        let mut url = self
            .url_template()
            .replace("{x}", &tile.col.to_string())
            .replace("{y}", &tile.row.to_string())
            .replace("{z}", &tile.zoom.to_string());

        let subdomains = self.subdomains();
        if !subdomains.is_empty() {
            let index = (tile.col as usize + tile.row as usize) % subdomains.len();
            url = url.replace("{s}", subdomains[index]);
        }
        url
    }
}

impl fmt::Display for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osm_url() {
        let url = ProviderConfig::OpenStreetMap.tile_url(&TileCoord::new(5, 7, 4));
        assert_eq!(url, "https://tile.openstreetmap.org/4/7/5.png");
    }

    #[test]
    fn test_arcgis_uses_row_before_column() {
        let url = ProviderConfig::ArcGisWorldImagery.tile_url(&TileCoord::new(100, 200, 10));
        assert_eq!(
            url,
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/10/100/200"
        );
    }

    #[test]
    fn test_subdomain_rotation() {
        let provider = ProviderConfig::GoogleSatellite;
        let a = provider.tile_url(&TileCoord::new(0, 0, 1));
        let b = provider.tile_url(&TileCoord::new(0, 1, 1));
        assert!(a.starts_with("https://mt0."));
        assert!(b.starts_with("https://mt1."));
        assert!(!a.contains("{s}"));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            ProviderConfig::from_name("openstreetmap"),
            Some(ProviderConfig::OpenStreetMap)
        );
        assert_eq!(
            ProviderConfig::from_name("esri-topo"),
            Some(ProviderConfig::ArcGisWorldTopo)
        );
        assert_eq!(ProviderConfig::from_name(NO_PROVIDER), None);
        assert_eq!(ProviderConfig::from_name("nonexistent"), None);
    }

    #[test]
    fn test_names_round_trip() {
        for provider in ProviderConfig::builtin() {
            assert_eq!(ProviderConfig::from_name(provider.name()), Some(provider.clone()));
            assert_eq!(ProviderConfig::from_name(provider.id()), Some(provider));
        }
    }

    #[test]
    fn test_custom_provider() {
        let provider = ProviderConfig::Custom {
            name: "local".into(),
            url_template: "http://localhost:8080/{z}/{x}/{y}.png".into(),
            min_zoom: 2,
            max_zoom: 12,
        };
        assert!(!provider.supports_zoom(1));
        assert!(provider.supports_zoom(12));
        assert_eq!(
            provider.tile_url(&TileCoord::new(3, 4, 5)),
            "http://localhost:8080/5/4/3.png"
        );
    }
}
