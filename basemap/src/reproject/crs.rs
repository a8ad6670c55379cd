//! Coordinate reference system identifiers.

use std::fmt;
use std::str::FromStr;

use crate::coord::{Extent, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

use super::ReprojectionError;

/// proj-string for spherical Web Mercator (EPSG:3857).
pub const WEB_MERCATOR_PROJ: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// proj-string for WGS84 longitude/latitude (EPSG:4326).
pub const GEOGRAPHIC_PROJ: &str = "+proj=longlat +ellps=WGS84 +no_defs";

/// A coordinate reference system the reprojector understands.
///
/// The two systems the basemap pipeline always needs get dedicated variants;
/// anything else is carried as a proj-string and resolved through `proj4rs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// EPSG:3857, the projected tiling space of XYZ tile servers.
    WebMercator,
    /// EPSG:4326, longitude/latitude in degrees.
    Geographic,
    /// Any other system, as a proj-string (`+proj=...`).
    Proj(String),
}

impl Crs {
    /// Authority code or proj-string identifying this system.
    pub fn name(&self) -> &str {
        match self {
            Crs::WebMercator => "EPSG:3857",
            Crs::Geographic => "EPSG:4326",
            Crs::Proj(definition) => definition,
        }
    }

    /// proj-string definition used when the pair has no closed-form path.
    pub fn proj_string(&self) -> &str {
        match self {
            Crs::WebMercator => WEB_MERCATOR_PROJ,
            Crs::Geographic => GEOGRAPHIC_PROJ,
            Crs::Proj(definition) => definition,
        }
    }

    /// True when coordinates are angular degrees rather than linear units.
    pub fn is_geographic(&self) -> bool {
        match self {
            Crs::WebMercator => false,
            Crs::Geographic => true,
            Crs::Proj(definition) => {
                definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
            }
        }
    }

    /// True when this is the projected tiling space itself.
    pub fn is_tiling_space(&self) -> bool {
        matches!(self, Crs::WebMercator)
    }

    /// Range of coordinates for which a transform into the tiling space is
    /// meaningful, when known.
    pub fn valid_bounds(&self) -> Option<Extent> {
        match self {
            Crs::WebMercator => Some(Extent::tiling_space()),
            Crs::Geographic => Some(Extent::new(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)),
            Crs::Proj(_) => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Crs {
    type Err = ReprojectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with("+proj=") {
            return Ok(Crs::Proj(trimmed.to_string()));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" | "EPSG:102113" => Ok(Crs::WebMercator),
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" => Ok(Crs::Geographic),
            _ => Err(ReprojectionError::UnknownCrs(trimmed.to_string())),
        }
    }
}
