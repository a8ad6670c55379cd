//! Tile stitching
//!
//! Composes positioned tile bitmaps into one raster covering the union of
//! their pixel rectangles. Every copied pixel's alpha is scaled by a uniform
//! opacity, so a change of opacity means stitching again.
//!
//! Where tiles overlap, the tile later in iteration order wins. Tile sets
//! from a footprint never overlap, so this only matters for hand-built input.

use image::{Rgba, RgbaImage};
use thiserror::Error;
use tracing::trace;

use crate::coord::PixelBounds;
use crate::provider::Tile;

/// Largest composite edge length accepted, in pixels.
pub const MAX_COMPOSITE_DIMENSION: u32 = 32_768;

/// Errors that can occur while stitching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StitchError {
    #[error("No tiles to stitch")]
    NoTiles,

    #[error("Tile {index} has an empty pixel rectangle")]
    EmptyTile { index: usize },

    #[error(
        "Tile {index} bitmap is {actual_width}x{actual_height}, \
         its pixel rectangle is {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Opacity {0} is outside 0..=100")]
    InvalidOpacity(u8),

    #[error("Composite of {width}x{height} exceeds {max} pixels per side")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Smallest pixel rectangle containing every tile, or `None` for no tiles.
pub fn union_bounds(tiles: &[Tile]) -> Option<PixelBounds> {
    let (first, rest) = tiles.split_first()?;
    Some(
        rest.iter()
            .fold(first.pixel_bounds, |acc, tile| acc.union(&tile.pixel_bounds)),
    )
}

/// Scales an alpha value by `opacity` percent, rounding to nearest.
#[inline]
pub fn scale_alpha(alpha: u8, opacity: u8) -> u8 {
    let opacity = opacity.min(100) as u32;
    ((alpha as u32 * opacity + 50) / 100) as u8
}

/// Stitches `tiles` into one image, applying `opacity` (0-100) to every pixel.
///
/// The result's top-left pixel corresponds to the top-left corner of
/// [`union_bounds`]. Uncovered areas stay fully transparent.
pub fn stitch(tiles: &[Tile], opacity: u8) -> Result<RgbaImage, StitchError> {
    if opacity > 100 {
        return Err(StitchError::InvalidOpacity(opacity));
    }
    validate(tiles)?;
    let bounds = union_bounds(tiles).ok_or(StitchError::NoTiles)?;

    if bounds.width > MAX_COMPOSITE_DIMENSION || bounds.height > MAX_COMPOSITE_DIMENSION {
        return Err(StitchError::TooLarge {
            width: bounds.width,
            height: bounds.height,
            max: MAX_COMPOSITE_DIMENSION,
        });
    }

    let mut target = RgbaImage::new(bounds.width, bounds.height);
    for tile in tiles {
        let dx = (tile.pixel_bounds.x - bounds.x) as u32;
        let dy = (tile.pixel_bounds.y - bounds.y) as u32;
        for (x, y, pixel) in tile.image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            target.put_pixel(dx + x, dy + y, Rgba([r, g, b, scale_alpha(a, opacity)]));
        }
    }

    trace!(
        tiles = tiles.len(),
        width = bounds.width,
        height = bounds.height,
        opacity,
        "Stitched composite"
    );
    Ok(target)
}

fn validate(tiles: &[Tile]) -> Result<(), StitchError> {
    if tiles.is_empty() {
        return Err(StitchError::NoTiles);
    }
    for (index, tile) in tiles.iter().enumerate() {
        let expected = tile.pixel_bounds;
        if expected.is_empty() {
            return Err(StitchError::EmptyTile { index });
        }
        let (actual_width, actual_height) = tile.image.dimensions();
        if (actual_width, actual_height) != (expected.width, expected.height) {
            return Err(StitchError::DimensionMismatch {
                index,
                expected_width: expected.width,
                expected_height: expected.height,
                actual_width,
                actual_height,
            });
        }
    }
    Ok(())
}
