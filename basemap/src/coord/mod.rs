//! Coordinate conversion module
//!
//! Provides the value types shared by the whole pipeline ([`Extent`],
//! [`GeoEnvelope`], [`PixelRect`], [`TileCoord`]), the fixed bounds of the
//! Web Mercator tiling space, and conversions between geographic coordinates
//! and slippy-map tile coordinates.

mod types;

pub use types::{
    clip, CoordError, Extent, GeoEnvelope, PixelBounds, PixelRect, TileCoord, DEFAULT_TILE_SIZE,
    MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM, WEB_MERCATOR_MAX, WEB_MERCATOR_MIN,
};

use std::f64::consts::PI;

/// Fractional tile-space position of a longitude at the given zoom.
///
/// The result is in `[0, 2^zoom]`; the integer part is the tile column.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    (lon + 180.0) / 360.0 * n
}

/// Fractional tile-space position of a latitude at the given zoom.
///
/// The result is in `[0, 2^zoom]` for latitudes inside the Web Mercator
/// range; the integer part is the tile row.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = lat * PI / 180.0;
    (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n
}

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
/// Points on the eastern or southern edge of the world map belong to the last
/// column or row.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let last = (1u32 << zoom) - 1;
    let col = (lon_to_tile_x(lon, zoom) as u32).min(last);
    let row = (lat_to_tile_y(lat, zoom).max(0.0) as u32).min(last);

    Ok(TileCoord { row, col, zoom })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.col as f64 / n * 360.0 - 180.0;

    let y = tile.row as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.row, 24640);
        assert_eq!(tile.col, 19295);
        assert_eq!(tile.zoom, 16);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_coords(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_coords(0.0, 0.0, 23);
        assert!(matches!(result, Err(CoordError::InvalidZoom(23))));
    }

    #[test]
    fn test_eastern_edge_maps_to_last_column() {
        let tile = to_tile_coords(0.0, 180.0, 3).unwrap();
        assert_eq!(tile.col, 7);
        let tile = to_tile_coords(MIN_LAT, 0.0, 3).unwrap();
        assert_eq!(tile.row, 7);
    }

    #[test]
    fn test_tile_to_lat_lon_at_equator() {
        let tile = TileCoord::new(512, 512, 10);
        let (lat, lon) = tile_to_lat_lon(&tile);
        assert!(lat.abs() < 1e-9, "Should be on the equator");
        assert!(lon.abs() < 1e-9, "Should be on the prime meridian");
    }

    #[test]
    fn test_zoom_zero_tile_covers_world() {
        let bounds = TileCoord::new(0, 0, 0).bounds();
        assert!((bounds.west - MIN_LON).abs() < 1e-9);
        assert!((bounds.east - MAX_LON).abs() < 1e-9);
        assert!((bounds.north - MAX_LAT).abs() < 1e-6);
        assert!((bounds.south - MIN_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_clip_saturates() {
        assert_eq!(clip(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clip(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(clip(15.0, 0.0, 10.0), 10.0);
        assert_eq!(clip(f64::NAN, 0.0, 10.0), 0.0);
        assert_eq!(clip(f64::INFINITY, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_extent_normalises_corners() {
        let extent = Extent::new(10.0, 20.0, -10.0, -20.0);
        assert_eq!(extent.min_x, -10.0);
        assert_eq!(extent.min_y, -20.0);
        assert_eq!(extent.max_x, 10.0);
        assert_eq!(extent.max_y, 20.0);
    }

    #[test]
    fn test_extent_clamp_to_tiling_space() {
        let huge = Extent::new(-3.0e7, -3.0e7, 3.0e7, 3.0e7);
        let clamped = huge.clamp_to_tiling_space();
        assert_eq!(clamped, Extent::tiling_space());

        let inside = Extent::new(-2.0e7, -2.0e7, 2.0e7, 2.0e7);
        assert_eq!(inside.clamp_to_tiling_space(), inside);
    }

    #[test]
    fn test_extent_shrink() {
        let extent = Extent::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(extent.shrink(10.0, 5.0), Extent::new(10.0, 5.0, 90.0, 45.0));
        // Over-shrinking collapses onto the centre
        let collapsed = extent.shrink(80.0, 80.0);
        assert_eq!(collapsed, Extent::new(50.0, 25.0, 50.0, 25.0));
        assert!(collapsed.is_degenerate());
    }

    #[test]
    fn test_extent_from_points() {
        assert!(Extent::from_points(&[]).is_none());
        let extent = Extent::from_points(&[(3.0, -1.0), (-2.0, 4.0), (1.0, 1.0)]).unwrap();
        assert_eq!(extent, Extent::new(-2.0, -1.0, 3.0, 4.0));
    }

    #[test]
    fn test_envelope_antimeridian_span() {
        let env = GeoEnvelope::new(170.0, -10.0, -170.0, 10.0);
        assert!(env.crosses_antimeridian());
        assert!((env.lon_span() - 20.0).abs() < 1e-9);

        let normal = GeoEnvelope::new(-10.0, -10.0, 10.0, 10.0);
        assert!(!normal.crosses_antimeridian());
        assert!((normal.lon_span() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_envelope_from_corners() {
        let extent = Extent::new(-10.0, -5.0, 10.0, 5.0);
        let env = GeoEnvelope::from_corners(&extent.corners());
        assert_eq!(env, GeoEnvelope::new(-10.0, -5.0, 10.0, 5.0));
    }

    #[test]
    fn test_envelope_from_corners_single_left_corner_wrapped() {
        // Bottom-left corner has crossed to the western hemisphere
        let corners = [(175.0, 10.0), (-170.0, 10.0), (-172.0, -10.0), (-179.0, -10.0)];
        let env = GeoEnvelope::from_corners(&corners);
        assert!(env.crosses_antimeridian());
        assert!((env.west - 175.0).abs() < 1e-9);
        assert!((env.east + 170.0).abs() < 1e-9);
        assert!((env.lon_span() - 15.0).abs() < 1e-9);

        // Top-left corner crossed instead
        let corners = [(-179.0, 10.0), (-170.0, 10.0), (-172.0, -10.0), (175.0, -10.0)];
        let env = GeoEnvelope::from_corners(&corners);
        assert!((env.west - 175.0).abs() < 1e-9);
        assert!((env.east + 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_envelope_from_corners_whole_world() {
        let env = GeoEnvelope::from_corners(&Extent::new(-180.0, -85.0, 180.0, 85.0).corners());
        assert_eq!(env, GeoEnvelope::new(-180.0, -85.0, 180.0, 85.0));
        assert!(!env.crosses_antimeridian());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_clip_idempotent_and_in_range(
                v in proptest::num::f64::ANY,
                a in -1.0e9..1.0e9_f64,
                width in 0.0..1.0e9_f64,
            ) {
                let b = a + width;
                let once = clip(v, a, b);
                prop_assert!(once >= a && once <= b, "{} not in [{}, {}]", once, a, b);
                prop_assert_eq!(clip(once, a, b), once);
            }

            #[test]
            fn test_roundtrip_within_one_tile(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_coords(lat, lon, zoom)?;
                let bounds = tile.bounds();

                prop_assert!(lon >= bounds.west - 1e-9 && lon <= bounds.east + 1e-9);
                prop_assert!(lat >= bounds.south - 1e-9 && lat <= bounds.north + 1e-9);
            }

            #[test]
            fn test_tile_coords_in_bounds(
                lat in -85.05..85.05_f64,
                lon in -180.0..=180.0_f64,
                zoom in 0u8..=22
            ) {
                let tile = to_tile_coords(lat, lon, zoom)?;
                let max_tile = 1u32 << zoom;
                prop_assert!(tile.row < max_tile);
                prop_assert!(tile.col < max_tile);
            }

            #[test]
            fn test_clamped_extent_inside_tiling_space(
                x1 in -1.0e8..1.0e8_f64,
                y1 in -1.0e8..1.0e8_f64,
                x2 in -1.0e8..1.0e8_f64,
                y2 in -1.0e8..1.0e8_f64,
            ) {
                let clamped = Extent::new(x1, y1, x2, y2).clamp_to_tiling_space();
                prop_assert!(Extent::tiling_space().contains(&clamped));
            }
        }
    }
}
