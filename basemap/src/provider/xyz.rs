//! XYZ tile source backed by an HTTP client.
//!
//! Resolves a request to a tile footprint, downloads the tiles with bounded
//! concurrency, decodes them to RGBA and returns them in row-major order.
//! Encoded tiles are kept in a [`TileCache`] so panning back over an area
//! does not hit the network again.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use image::imageops::FilterType;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::coord::{GeoEnvelope, PixelRect, TileCoord, DEFAULT_TILE_SIZE};
use crate::grid::{GridCell, TileGrid};

use super::cache::TileCache;
use super::catalog::ProviderConfig;
use super::http::AsyncHttpClient;
use super::types::{FetchError, ProviderError, Tile, TileSet, TileSource};

/// Default number of simultaneous tile downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Default upper bound on tiles per request.
pub const DEFAULT_MAX_TILES_PER_REQUEST: usize = 256;

/// Tile source for any [`ProviderConfig`] URL template.
pub struct XyzTileSource<C: AsyncHttpClient> {
    provider: ProviderConfig,
    client: C,
    grid: TileGrid,
    cache: TileCache,
    max_concurrent: usize,
    max_tiles: usize,
}

impl<C: AsyncHttpClient> XyzTileSource<C> {
    /// Creates a source with a private cache and default limits.
    pub fn new(provider: ProviderConfig, client: C) -> Self {
        let grid = TileGrid::new(DEFAULT_TILE_SIZE, provider.min_zoom(), provider.max_zoom());
        Self {
            provider,
            client,
            grid,
            cache: TileCache::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_tiles: DEFAULT_MAX_TILES_PER_REQUEST,
        }
    }

    /// Shares an existing cache, e.g. across provider switches.
    pub fn with_cache(mut self, cache: TileCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.grid = TileGrid::new(tile_size, self.provider.min_zoom(), self.provider.max_zoom());
        self
    }

    /// Narrows the zoom range below the provider's own.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.grid = TileGrid::new(
            self.grid.tile_size(),
            min_zoom.max(self.provider.min_zoom()),
            max_zoom.min(self.provider.max_zoom()),
        );
        self
    }

    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_max_tiles(mut self, max: usize) -> Self {
        self.max_tiles = max.max(1);
        self
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Downloads (or reads from cache) and decodes one tile.
    async fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage, ProviderError> {
        if !self.provider.supports_zoom(coord.zoom) {
            return Err(ProviderError::UnsupportedZoom(coord.zoom));
        }

        let bytes = match self.cache.get(self.provider.id(), coord).await {
            Some(bytes) => bytes,
            None => {
                let url = self.provider.tile_url(&coord);
                let bytes = Arc::new(self.client.get(&url).await?);
                self.cache
                    .put(self.provider.id(), coord, Arc::clone(&bytes))
                    .await;
                bytes
            }
        };

        let tile_size = self.grid.tile_size();
        tokio::task::spawn_blocking(move || decode_tile(&bytes, tile_size))
            .await
            .map_err(|e| ProviderError::DecodeError(format!("decode task failed: {}", e)))?
    }
}

/// Decodes an encoded tile and scales it to `tile_size` if the server sent a
/// different resolution (e.g. 512px "retina" tiles).
pub fn decode_tile(bytes: &[u8], tile_size: u32) -> Result<RgbaImage, ProviderError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ProviderError::DecodeError(e.to_string()))?
        .to_rgba8();

    if image.dimensions() == (tile_size, tile_size) {
        Ok(image)
    } else {
        Ok(image::imageops::resize(
            &image,
            tile_size,
            tile_size,
            FilterType::Triangle,
        ))
    }
}

impl<C: AsyncHttpClient> TileSource for XyzTileSource<C> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn get_tiles<'a>(
        &'a self,
        envelope: GeoEnvelope,
        pixels: PixelRect,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TileSet, FetchError>> {
        Box::pin(async move {
            if pixels.is_empty() {
                return Err(FetchError::EmptyTarget {
                    width: pixels.width,
                    height: pixels.height,
                });
            }

            let footprint = self.grid.footprint(&envelope, pixels);
            let count = footprint.tile_count();
            if count == 0 {
                return Err(FetchError::NoTiles(envelope));
            }
            if count > self.max_tiles {
                return Err(FetchError::TooManyTiles {
                    needed: count,
                    limit: self.max_tiles,
                });
            }

            debug!(
                provider = self.provider.id(),
                zoom = footprint.zoom,
                tiles = count,
                wraps = footprint.wraps_antimeridian(),
                "Fetching tiles"
            );

            let cells: Vec<GridCell> = footprint.tiles().collect();
            let downloads = stream::iter(cells)
                .map(|cell| async move { (cell, self.fetch_tile(cell.coord).await) })
                .buffered(self.max_concurrent)
                .collect::<Vec<_>>();

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                results = downloads => results,
            };

            let tile_size = self.grid.tile_size();
            let mut tiles = Vec::with_capacity(count);
            let mut last_error = None;
            for (cell, result) in results {
                match result {
                    Ok(image) => tiles.push(Tile::new(cell, tile_size, image)),
                    Err(e) => {
                        warn!(
                            tile = %cell.coord,
                            error = %e,
                            "Tile failed, using transparent placeholder"
                        );
                        tiles.push(Tile::placeholder(cell, tile_size));
                        last_error = Some(e);
                    }
                }
            }

            let set = TileSet::new(footprint, tiles);
            if set.failed_count() == set.len() {
                if let Some(last) = last_error {
                    return Err(FetchError::AllTilesFailed { count, last });
                }
            }

            debug!(
                provider = self.provider.id(),
                tiles = set.len(),
                failed = set.failed_count(),
                "Tiles fetched"
            );
            Ok(set)
        })
    }
}
