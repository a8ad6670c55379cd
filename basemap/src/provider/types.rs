//! Core tile source types.

use futures::future::BoxFuture;
use image::RgbaImage;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::coord::{GeoEnvelope, PixelBounds, PixelRect, TileCoord};
use crate::grid::{Footprint, GridCell};

/// Errors raised while downloading or decoding a single tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Zoom level outside the provider's range
    #[error("Unsupported zoom level: {0}")]
    UnsupportedZoom(u8),
    /// Response body could not be decoded as an image
    #[error("Failed to decode tile image: {0}")]
    DecodeError(String),
    /// Response was empty or otherwise unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by a [`TileSource`] for a whole request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Pixel rectangle has no area
    #[error("Target pixel rectangle {width}x{height} is empty")]
    EmptyTarget { width: u32, height: u32 },
    /// Source produced no tiles for the envelope
    #[error("No tiles available for {0}")]
    NoTiles(GeoEnvelope),
    /// Footprint exceeds the per-request tile limit
    #[error("Request needs {needed} tiles, limit is {limit}")]
    TooManyTiles { needed: usize, limit: usize },
    /// Every tile in the footprint failed to download or decode
    #[error("All {count} tiles failed, last error: {last}")]
    AllTilesFailed { count: usize, last: ProviderError },
    /// Provider name did not match any known provider
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    /// Cancellation token fired while downloading
    #[error("Fetch cancelled")]
    Cancelled,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A fetched raster tile positioned in its zoom level's pixel space.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Address used to request the tile (column wrapped).
    pub coord: TileCoord,
    /// Pixel rectangle, with columns unwrapped across the anti-meridian.
    pub pixel_bounds: PixelBounds,
    /// Geographic bounds, with unwrapped longitudes.
    pub bounds: GeoEnvelope,
    pub image: RgbaImage,
    /// True when the tile stands in for one that failed to load.
    pub placeholder: bool,
}

impl Tile {
    /// Creates a tile for a footprint cell.
    pub fn new(cell: GridCell, tile_size: u32, image: RgbaImage) -> Self {
        Self {
            coord: cell.coord,
            pixel_bounds: cell.pixel_bounds(tile_size),
            bounds: cell.bounds(),
            image,
            placeholder: false,
        }
    }

    /// Creates a fully transparent tile for a cell whose download failed.
    ///
    /// Keeps the cell's slot in the composite so that the covered extent
    /// does not depend on which tiles happened to fail.
    pub fn placeholder(cell: GridCell, tile_size: u32) -> Self {
        Self {
            placeholder: true,
            ..Self::new(cell, tile_size, RgbaImage::new(tile_size, tile_size))
        }
    }
}

/// Tiles covering one request, in row-major order.
#[derive(Debug, Clone)]
pub struct TileSet {
    footprint: Footprint,
    tiles: Vec<Tile>,
}

impl TileSet {
    pub fn new(footprint: Footprint, tiles: Vec<Tile>) -> Self {
        Self { footprint, tiles }
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of tiles that are placeholders for failed downloads.
    pub fn failed_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.placeholder).count()
    }

    /// The tile whose pixel rectangle starts furthest up and left.
    pub fn top_left(&self) -> Option<&Tile> {
        self.tiles
            .iter()
            .min_by_key(|t| (t.pixel_bounds.y, t.pixel_bounds.x))
    }

    /// The tile whose pixel rectangle ends furthest down and right.
    pub fn bottom_right(&self) -> Option<&Tile> {
        self.tiles
            .iter()
            .max_by_key(|t| (t.pixel_bounds.bottom(), t.pixel_bounds.right()))
    }

    /// Geographic extent actually covered, from the corner tiles.
    ///
    /// Longitudes are unwrapped, so a set crossing the anti-meridian reports
    /// `east > 180`.
    pub fn covered_envelope(&self) -> Option<GeoEnvelope> {
        let top_left = self.top_left()?;
        let bottom_right = self.bottom_right()?;
        Some(GeoEnvelope {
            west: top_left.bounds.west,
            south: bottom_right.bounds.south,
            east: bottom_right.bounds.east,
            north: top_left.bounds.north,
        })
    }
}

/// External collaborator that supplies raster tiles for an envelope.
///
/// Implementations choose the zoom level and tiles themselves; the caller
/// only states what must be covered and at what pixel size. The token is a
/// hint: a source may stop early and return [`FetchError::Cancelled`], and
/// the caller discards any result obtained after cancellation.
pub trait TileSource: Send + Sync {
    /// Display name of the source.
    fn name(&self) -> &str;

    /// Fetches the tiles covering `envelope` for a raster of size `pixels`.
    fn get_tiles<'a>(
        &'a self,
        envelope: GeoEnvelope,
        pixels: PixelRect,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TileSet, FetchError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, column: u32) -> GridCell {
        GridCell::new(row, column, 3)
    }

    #[test]
    fn test_placeholder_is_transparent() {
        let tile = Tile::placeholder(cell(1, 2), 256);
        assert!(tile.placeholder);
        assert_eq!(tile.image.dimensions(), (256, 256));
        assert!(tile.image.pixels().all(|p| p.0[3] == 0));
        assert_eq!(tile.pixel_bounds, PixelBounds::new(512, 256, 256, 256));
    }

    #[test]
    fn test_corner_tiles() {
        let footprint = Footprint {
            zoom: 3,
            col_start: 2,
            col_end: 3,
            row_start: 1,
            row_end: 2,
        };
        let tiles: Vec<Tile> = footprint
            .tiles()
            .map(|c| Tile::new(c, 256, RgbaImage::new(256, 256)))
            .collect();
        let set = TileSet::new(footprint, tiles);

        assert_eq!(set.len(), 4);
        assert_eq!(set.top_left().map(|t| (t.coord.row, t.coord.col)), Some((1, 2)));
        assert_eq!(
            set.bottom_right().map(|t| (t.coord.row, t.coord.col)),
            Some((2, 3))
        );

        let covered = set.covered_envelope().unwrap();
        let expected = footprint.envelope();
        assert!((covered.west - expected.west).abs() < 1e-9);
        assert!((covered.north - expected.north).abs() < 1e-9);
        assert!((covered.east - expected.east).abs() < 1e-9);
        assert!((covered.south - expected.south).abs() < 1e-9);
    }

    #[test]
    fn test_empty_set_has_no_corners() {
        let footprint = Footprint {
            zoom: 0,
            col_start: 0,
            col_end: 0,
            row_start: 0,
            row_end: 0,
        };
        let set = TileSet::new(footprint, Vec::new());
        assert!(set.is_empty());
        assert!(set.top_left().is_none());
        assert!(set.covered_envelope().is_none());
    }

    #[test]
    fn test_fetch_error_from_provider_error() {
        let err: FetchError = ProviderError::UnsupportedZoom(25).into();
        assert!(matches!(err, FetchError::Provider(ProviderError::UnsupportedZoom(25))));
        assert_eq!(err.to_string(), "Unsupported zoom level: 25");
    }
}
