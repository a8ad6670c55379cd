//! Offline tile sources.
//!
//! [`SolidColorSource`] serves single-colour tiles without touching the
//! network and remembers every request it served. It backs offline renders
//! and the integration tests. [`StaticSourceFactory`] hands out pre-built
//! sources by name.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::coord::{GeoEnvelope, PixelRect};
use crate::grid::TileGrid;

use super::factory::SourceFactory;
use super::types::{FetchError, Tile, TileSet, TileSource};

/// A source whose every tile is one colour.
pub struct SolidColorSource {
    name: String,
    color: Rgba<u8>,
    grid: TileGrid,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<(GeoEnvelope, PixelRect)>>,
}

impl SolidColorSource {
    pub fn new(name: impl Into<String>, color: Rgba<u8>) -> Self {
        Self {
            name: name.into(),
            color,
            grid: TileGrid::default(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_grid(mut self, grid: TileGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Simulated latency per request. Cancellation interrupts it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Envelope and pixel size of every request, oldest first.
    pub fn requests(&self) -> Vec<(GeoEnvelope, PixelRect)> {
        self.requests.lock().clone()
    }
}

impl TileSource for SolidColorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_tiles<'a>(
        &'a self,
        envelope: GeoEnvelope,
        pixels: PixelRect,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TileSet, FetchError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push((envelope, pixels));

            if pixels.is_empty() {
                return Err(FetchError::EmptyTarget {
                    width: pixels.width,
                    height: pixels.height,
                });
            }

            if !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let footprint = self.grid.footprint(&envelope, pixels);
            if footprint.tile_count() == 0 {
                return Err(FetchError::NoTiles(envelope));
            }
            let size = self.grid.tile_size();
            let tiles = footprint
                .tiles()
                .map(|cell| Tile::new(cell, size, RgbaImage::from_pixel(size, size, self.color)))
                .collect();
            Ok(TileSet::new(footprint, tiles))
        })
    }
}

/// Factory over a fixed set of sources, matched by name ignoring case.
#[derive(Default)]
pub struct StaticSourceFactory {
    sources: Vec<Arc<dyn TileSource>>,
}

impl StaticSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl SourceFactory for StaticSourceFactory {
    fn available(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    fn create(&self, name: &str) -> Result<Arc<dyn TileSource>, FetchError> {
        self.sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| FetchError::UnknownProvider(name.to_string()))
    }
}
