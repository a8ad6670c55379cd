//! Tile grid footprint calculation.
//!
//! Given a geographic envelope and the pixel rectangle a composite must fill,
//! [`TileGrid::footprint`] picks a zoom level and the block of tile columns
//! and rows whose union covers the envelope.
//!
//! # Zoom selection
//!
//! The chosen zoom is the smallest one at which the envelope spans at least as
//! many source pixels as the target rectangle has, on both axes. A smaller
//! geographic span per output pixel therefore yields a higher zoom. The result
//! is clamped to the grid's zoom range.
//!
//! # Anti-meridian
//!
//! An envelope with `west > east` produces a column span that runs past the
//! last column of the world (`col_end >= 2^zoom`). Cells keep their unwrapped
//! column for pixel placement; [`GridCell::coord`] carries the wrapped column
//! used to address the tile server.

use crate::coord::{
    lat_to_tile_y, lon_to_tile_x, tile_to_lat_lon, GeoEnvelope, PixelBounds, PixelRect, TileCoord,
    DEFAULT_TILE_SIZE, MAX_LON, MAX_ZOOM, MIN_ZOOM,
};

/// Tolerance used when rounding fractional tile positions, so that an edge
/// sitting exactly on a tile boundary does not pull in an extra tile.
const EDGE_EPSILON: f64 = 1e-9;

/// Tiling scheme parameters for footprint calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: MIN_ZOOM,
            max_zoom: 19,
        }
    }
}

impl TileGrid {
    /// Creates a grid with the given tile edge length and zoom range.
    ///
    /// The zoom range is normalised so that `min_zoom <= max_zoom <= MAX_ZOOM`.
    pub fn new(tile_size: u32, min_zoom: u8, max_zoom: u8) -> Self {
        let max_zoom = max_zoom.min(MAX_ZOOM);
        Self {
            tile_size: tile_size.max(1),
            min_zoom: min_zoom.min(max_zoom),
            max_zoom,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Chooses the zoom level for covering `envelope` with `pixels`.
    pub fn zoom_for(&self, envelope: &GeoEnvelope, pixels: PixelRect) -> u8 {
        let envelope = envelope.clamp_to_tiling_space();
        let tile = self.tile_size as f64;

        // Span of the envelope in zoom-0 tile units.
        let x_span = envelope.lon_span() / 360.0;
        let y_span = lat_to_tile_y(envelope.south, 0) - lat_to_tile_y(envelope.north, 0);

        let needed = |span: f64, target: u32| -> f64 {
            if target == 0 {
                return f64::NEG_INFINITY;
            }
            if span <= 0.0 {
                return f64::INFINITY;
            }
            (target as f64 / (span * tile)).log2()
        };

        let wanted = needed(x_span, pixels.width).max(needed(y_span, pixels.height));
        let zoom = if wanted.is_nan() || wanted == f64::INFINITY {
            self.max_zoom as f64
        } else {
            (wanted - EDGE_EPSILON).ceil()
        };

        zoom.clamp(self.min_zoom as f64, self.max_zoom as f64) as u8
    }

    /// Computes the tiles needed to cover `envelope` at a resolution adequate
    /// for `pixels`.
    ///
    /// The envelope is clipped to the Web Mercator latitude range first.
    pub fn footprint(&self, envelope: &GeoEnvelope, pixels: PixelRect) -> Footprint {
        let zoom = self.zoom_for(envelope, pixels);
        self.footprint_at_zoom(envelope, zoom)
    }

    /// Computes the covering tile block at a fixed zoom level.
    pub fn footprint_at_zoom(&self, envelope: &GeoEnvelope, zoom: u8) -> Footprint {
        let envelope = envelope.clamp_to_tiling_space();
        let zoom = zoom.min(MAX_ZOOM);
        let n = 1u32 << zoom;
        let last = n - 1;

        let col_start = (lon_to_tile_x(envelope.west, zoom) + EDGE_EPSILON).floor() as u32;
        let col_start = col_start.min(last);

        let col_end = if envelope.crosses_antimeridian() {
            let east = lon_to_tile_x(envelope.east, zoom) + n as f64;
            let end = ((east - EDGE_EPSILON).ceil() as u32).saturating_sub(1);
            end.clamp(col_start, col_start + last)
        } else {
            let east = lon_to_tile_x(envelope.east, zoom);
            let end = ((east - EDGE_EPSILON).ceil() as u32).saturating_sub(1);
            end.clamp(col_start, last)
        };

        let row_start = (lat_to_tile_y(envelope.north, zoom).max(0.0) + EDGE_EPSILON).floor() as u32;
        let row_start = row_start.min(last);
        let south = lat_to_tile_y(envelope.south, zoom);
        let row_end = (((south - EDGE_EPSILON).ceil()).max(0.0) as u32)
            .saturating_sub(1)
            .clamp(row_start, last);

        Footprint {
            zoom,
            col_start,
            col_end,
            row_start,
            row_end,
        }
    }
}

/// Block of tiles covering an envelope at one zoom level.
///
/// Ranges are inclusive. `col_end` may exceed `2^zoom - 1` when the block
/// wraps across the anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub zoom: u8,
    pub col_start: u32,
    pub col_end: u32,
    pub row_start: u32,
    pub row_end: u32,
}

impl Footprint {
    pub fn columns(&self) -> u32 {
        self.col_end - self.col_start + 1
    }

    pub fn rows(&self) -> u32 {
        self.row_end - self.row_start + 1
    }

    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn wraps_antimeridian(&self) -> bool {
        self.col_end >= (1u32 << self.zoom)
    }

    /// Size in pixels of the stitched block.
    pub fn pixel_size(&self, tile_size: u32) -> PixelRect {
        PixelRect::new(self.columns() * tile_size, self.rows() * tile_size)
    }

    /// Iterates the cells of the block in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = GridCell> + '_ {
        (self.row_start..=self.row_end).flat_map(move |row| {
            (self.col_start..=self.col_end).map(move |column| GridCell::new(row, column, self.zoom))
        })
    }

    /// The top-left-most cell of the block.
    pub fn top_left(&self) -> GridCell {
        GridCell::new(self.row_start, self.col_start, self.zoom)
    }

    /// The bottom-right-most cell of the block.
    pub fn bottom_right(&self) -> GridCell {
        GridCell::new(self.row_end, self.col_end, self.zoom)
    }

    /// Geographic envelope actually covered by the block. Longitudes of a
    /// wrapping block are folded back so that `west > east`.
    pub fn envelope(&self) -> GeoEnvelope {
        let north_west = self.top_left().bounds();
        let south_east = self.bottom_right().bounds();
        let east = if south_east.east > MAX_LON {
            south_east.east - 360.0
        } else {
            south_east.east
        };
        GeoEnvelope {
            west: north_west.west,
            south: south_east.south,
            east,
            north: north_west.north,
        }
    }
}

/// One cell of a [`Footprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    /// Tile address with the column wrapped into `[0, 2^zoom)`.
    pub coord: TileCoord,
    /// Column before wrapping; continuous across the anti-meridian.
    pub column: u32,
}

impl GridCell {
    pub fn new(row: u32, column: u32, zoom: u8) -> Self {
        let n = 1u32 << zoom;
        Self {
            coord: TileCoord::new(row, column % n, zoom),
            column,
        }
    }

    pub fn row(&self) -> u32 {
        self.coord.row
    }

    /// Geographic bounds using unwrapped longitudes, so cells east of the
    /// anti-meridian report `east > 180`.
    pub fn bounds(&self) -> GeoEnvelope {
        let zoom = self.coord.zoom;
        let (north, west) = tile_to_lat_lon(&TileCoord::new(self.coord.row, self.column, zoom));
        let (south, east) =
            tile_to_lat_lon(&TileCoord::new(self.coord.row + 1, self.column + 1, zoom));
        GeoEnvelope {
            west,
            south,
            east,
            north,
        }
    }

    /// Pixel position of the cell's top-left corner in the zoom level's global
    /// pixel space.
    pub fn pixel_origin(&self, tile_size: u32) -> (i64, i64) {
        (
            self.column as i64 * tile_size as i64,
            self.coord.row as i64 * tile_size as i64,
        )
    }

    /// Pixel rectangle of the cell in the zoom level's global pixel space.
    pub fn pixel_bounds(&self, tile_size: u32) -> PixelBounds {
        let (x, y) = self.pixel_origin(tile_size);
        PixelBounds::new(x, y, tile_size, tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{MAX_LAT, MIN_LAT, MIN_LON};

    fn world() -> GeoEnvelope {
        GeoEnvelope::new(MIN_LON, MIN_LAT, MAX_LON, MAX_LAT)
    }

    #[test]
    fn test_world_in_256_pixels_is_zoom_zero() {
        let grid = TileGrid::default();
        let footprint = grid.footprint(&world(), PixelRect::new(256, 256));
        assert_eq!(footprint.zoom, 0);
        assert_eq!(footprint.tile_count(), 1);
    }

    #[test]
    fn test_world_in_512_pixels_is_zoom_one() {
        let grid = TileGrid::default();
        let footprint = grid.footprint(&world(), PixelRect::new(512, 512));
        assert_eq!(footprint.zoom, 1);
        assert_eq!(footprint.columns(), 2);
        assert_eq!(footprint.rows(), 2);
    }

    #[test]
    fn test_non_power_of_two_rounds_up() {
        let grid = TileGrid::default();
        let footprint = grid.footprint(&world(), PixelRect::new(300, 200));
        assert_eq!(footprint.zoom, 1);
    }

    #[test]
    fn test_smaller_span_gives_higher_zoom() {
        let grid = TileGrid::default();
        let pixels = PixelRect::new(800, 600);
        let wide = grid.zoom_for(&GeoEnvelope::new(-20.0, 40.0, 20.0, 60.0), pixels);
        let narrow = grid.zoom_for(&GeoEnvelope::new(-2.0, 49.0, 2.0, 51.0), pixels);
        assert!(narrow > wide, "narrow {} should exceed wide {}", narrow, wide);
    }

    #[test]
    fn test_zoom_clamped_to_range() {
        let grid = TileGrid::new(256, 3, 10);
        assert_eq!(grid.zoom_for(&world(), PixelRect::new(256, 256)), 3);
        let tiny = GeoEnvelope::new(0.0, 0.0, 0.0001, 0.0001);
        assert_eq!(grid.zoom_for(&tiny, PixelRect::new(1024, 1024)), 10);
        // Degenerate envelope
        let point = GeoEnvelope::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(grid.zoom_for(&point, PixelRect::new(10, 10)), 10);
    }

    #[test]
    fn test_footprint_covers_envelope() {
        let grid = TileGrid::default();
        let envelope = GeoEnvelope::new(-0.5, 51.3, 0.3, 51.7); // London
        let footprint = grid.footprint(&envelope, PixelRect::new(1024, 768));
        let covered = footprint.envelope();

        assert!(covered.west <= envelope.west);
        assert!(covered.east >= envelope.east);
        assert!(covered.north >= envelope.north);
        assert!(covered.south <= envelope.south);
    }

    #[test]
    fn test_edge_on_tile_boundary_does_not_add_tile() {
        let grid = TileGrid::default();
        // Exactly the north-west quadrant at zoom 1
        let envelope = GeoEnvelope::new(-180.0, 0.0, 0.0, MAX_LAT);
        let footprint = grid.footprint_at_zoom(&envelope, 1);
        assert_eq!(footprint.col_start, 0);
        assert_eq!(footprint.col_end, 0);
        assert_eq!(footprint.row_start, 0);
        assert_eq!(footprint.row_end, 0);
    }

    #[test]
    fn test_antimeridian_footprint_wraps() {
        let grid = TileGrid::default();
        let envelope = GeoEnvelope::new(170.0, -10.0, -170.0, 10.0);
        let footprint = grid.footprint_at_zoom(&envelope, 3);

        assert!(footprint.wraps_antimeridian());
        assert_eq!(footprint.col_start, 7);
        assert_eq!(footprint.col_end, 8);

        let cells: Vec<_> = footprint.tiles().collect();
        let wrapped: Vec<u32> = cells.iter().map(|c| c.coord.col).collect();
        assert!(wrapped.iter().all(|&c| c == 7 || c == 0));

        // Unwrapped cells are continuous in pixel space
        let east_cell = cells.iter().find(|c| c.column == 8).unwrap();
        assert_eq!(east_cell.pixel_origin(256).0, 8 * 256);
        assert!(east_cell.bounds().east > MAX_LON);

        let covered = footprint.envelope();
        assert!(covered.crosses_antimeridian());
    }

    #[test]
    fn test_cells_row_major() {
        let footprint = Footprint {
            zoom: 4,
            col_start: 2,
            col_end: 4,
            row_start: 5,
            row_end: 6,
        };
        let cells: Vec<(u32, u32)> = footprint.tiles().map(|c| (c.row(), c.column)).collect();
        assert_eq!(cells, vec![(5, 2), (5, 3), (5, 4), (6, 2), (6, 3), (6, 4)]);
        assert_eq!(footprint.top_left().column, 2);
        assert_eq!(footprint.bottom_right().row(), 6);
        assert_eq!(footprint.pixel_size(256), PixelRect::new(768, 512));
    }

    #[test]
    fn test_out_of_range_envelope_is_clipped() {
        let grid = TileGrid::default();
        let envelope = GeoEnvelope::new(-400.0, -89.0, 400.0, 89.0);
        let footprint = grid.footprint_at_zoom(&envelope, 2);
        assert_eq!(footprint.col_start, 0);
        assert_eq!(footprint.col_end, 3);
        assert_eq!(footprint.row_start, 0);
        assert_eq!(footprint.row_end, 3);
    }
}
