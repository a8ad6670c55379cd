//! Coordinate type definitions

use std::fmt;

/// Half the circumference of the spherical Web Mercator earth, in metres.
///
/// The projected tiling space is the square `[-WEB_MERCATOR_MAX, WEB_MERCATOR_MAX]`
/// on both axes.
pub const WEB_MERCATOR_MAX: f64 = 20_037_508.342_789_244;
pub const WEB_MERCATOR_MIN: f64 = -WEB_MERCATOR_MAX;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels served by common XYZ tile servers
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 22;

/// Edge length of a standard slippy-map tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Saturates `value` into `[min, max]`.
///
/// Unlike [`f64::clamp`] this never panics: a NaN input clips to `min`, and an
/// inverted range collapses to `min`.
#[inline]
pub fn clip(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || value < min || max < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Axis-aligned rectangle in some coordinate reference system.
///
/// The CRS is implied by context (the canvas projection, the tiling space).
/// Construction normalises the corners so that `min_x <= max_x` and
/// `min_y <= max_y` always hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Creates an extent from two opposite corners given in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// The full square of the Web Mercator tiling space.
    pub fn tiling_space() -> Self {
        Self::new(
            WEB_MERCATOR_MIN,
            WEB_MERCATOR_MIN,
            WEB_MERCATOR_MAX,
            WEB_MERCATOR_MAX,
        )
    }

    /// Smallest extent containing all `points`, or `None` for an empty slice.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut extent = Self::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// True when the extent has zero width or zero height.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// The four corners in order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.max_y),
            (self.max_x, self.max_y),
            (self.max_x, self.min_y),
            (self.min_x, self.min_y),
        ]
    }

    /// Returns a copy with every coordinate clipped into `bounds`.
    pub fn clamp_to(&self, bounds: &Extent) -> Self {
        Self::new(
            clip(self.min_x, bounds.min_x, bounds.max_x),
            clip(self.min_y, bounds.min_y, bounds.max_y),
            clip(self.max_x, bounds.min_x, bounds.max_x),
            clip(self.max_y, bounds.min_y, bounds.max_y),
        )
    }

    /// Returns a copy clipped into the Web Mercator tiling space.
    pub fn clamp_to_tiling_space(&self) -> Self {
        self.clamp_to(&Self::tiling_space())
    }

    /// Returns a copy shrunk by `dx` on the left and right and `dy` on the top
    /// and bottom. Shrinking past the centre collapses onto the centre line.
    pub fn shrink(&self, dx: f64, dy: f64) -> Self {
        let (cx, cy) = self.center();
        let half_w = (self.width() / 2.0 - dx).max(0.0);
        let half_h = (self.height() / 2.0 - dy).max(0.0);
        Self::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// True when `other` lies entirely within this extent.
    pub fn contains(&self, other: &Extent) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}, {:.3} : {:.3}, {:.3}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Geographic rectangle in longitude/latitude degrees.
///
/// `west > east` marks an envelope that crosses the anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoEnvelope {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoEnvelope {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south: south.min(north),
            east,
            north: south.max(north),
        }
    }

    /// Builds an envelope from reprojected corner points (x = lon, y = lat).
    ///
    /// Corners are expected in [`Extent::corners`] order so that the western
    /// edge is taken from the left-hand corners even when the longitudes wrap.
    /// Longitudes are first unwrapped into one continuous range starting at the
    /// top-left corner, so a single corner past ±180° still yields a wrapping
    /// envelope. A span of a full turn or more becomes the whole world.
    pub fn from_corners(corners: &[(f64, f64); 4]) -> Self {
        let reference = corners[0].0;
        let top_left = reference;
        let bottom_left = unwrap_lon(corners[3].0, reference);
        let west = top_left.min(bottom_left);

        let unwrap_right = |lon: f64| if lon < west { lon + 360.0 } else { lon };
        let east = unwrap_right(corners[1].0).max(unwrap_right(corners[2].0));

        let north = corners[0].1.max(corners[1].1);
        let south = corners[2].1.min(corners[3].1);

        if east - west >= 360.0 - LON_EPSILON {
            return Self::new(MIN_LON, south, MAX_LON, north);
        }
        Self::new(wrap_lon(west), south, wrap_lon(east), north)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Longitudinal span in degrees, accounting for anti-meridian wrap.
    pub fn lon_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            (MAX_LON - self.west) + (self.east - MIN_LON)
        } else {
            self.east - self.west
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Returns a copy with latitudes clipped to the Web Mercator range and
    /// longitudes clipped to `[-180, 180]`.
    pub fn clamp_to_tiling_space(&self) -> Self {
        Self {
            west: clip(self.west, MIN_LON, MAX_LON),
            south: clip(self.south, MIN_LAT, MAX_LAT),
            east: clip(self.east, MIN_LON, MAX_LON),
            north: clip(self.north, MIN_LAT, MAX_LAT),
        }
    }
}

const LON_EPSILON: f64 = 1e-9;

/// Shifts `lon` by whole turns to lie within half a turn of `reference`.
fn unwrap_lon(lon: f64, reference: f64) -> f64 {
    if lon - reference > 180.0 {
        lon - 360.0
    } else if reference - lon > 180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Brings an unwrapped longitude back into `[-180, 180]`. Rounding noise at
/// the anti-meridian is left alone.
fn wrap_lon(lon: f64) -> f64 {
    if lon > MAX_LON + LON_EPSILON {
        lon - 360.0
    } else if lon < MIN_LON - LON_EPSILON {
        lon + 360.0
    } else {
        lon
    }
}

impl fmt::Display for GeoEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[W {:.5}, S {:.5}, E {:.5}, N {:.5}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// Size of the on-screen raster that a basemap composite must fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel-space rectangle: position of a raster within a larger pixel grid.
///
/// `x`/`y` may be negative or exceed the grid when rectangles are positioned
/// relative to an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelBounds {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelBounds {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &PixelBounds) -> PixelBounds {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        PixelBounds {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }
}

/// Tile coordinates in Web Mercator / Slippy Map system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
    /// X coordinate (east-west), 0 at west
    pub col: u32,
    /// Zoom level
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(row: u32, col: u32, zoom: u8) -> Self {
        Self { row, col, zoom }
    }

    /// Number of tiles along one axis at this tile's zoom level.
    #[inline]
    pub fn tiles_per_axis(&self) -> u32 {
        1u32 << self.zoom
    }

    /// Geographic bounds of this tile.
    pub fn bounds(&self) -> GeoEnvelope {
        let (north, west) = super::tile_to_lat_lon(self);
        let (south, east) = super::tile_to_lat_lon(&TileCoord {
            row: self.row + 1,
            col: self.col + 1,
            zoom: self.zoom,
        });
        GeoEnvelope::new(west, south, east, north)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Zoom level is outside valid range (0 to 22)
    InvalidZoom(u8),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidZoom(zoom) => {
                write!(
                    f,
                    "Invalid zoom level: {} (must be between {} and {})",
                    zoom, MIN_ZOOM, MAX_ZOOM
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
