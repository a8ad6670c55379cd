//! The on-map raster layer holding the current composite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::RwLock;

use crate::canvas::{LayerEntry, LayerId, LayerKind};
use crate::coord::Extent;
use crate::reproject::Crs;

/// A stitched basemap image and where it sits on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    pub image: RgbaImage,
    /// Extent covered by `image`, in `crs` coordinates.
    pub extent: Extent,
    pub crs: Crs,
}

impl CompositeImage {
    pub fn new(image: RgbaImage, extent: Extent, crs: Crs) -> Self {
        Self { image, extent, crs }
    }

    /// A 1x1 fully transparent image shown until the first job completes.
    pub fn placeholder(extent: Extent, crs: Crs) -> Self {
        Self::new(RgbaImage::new(1, 1), extent, crs)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Raster layer whose image is replaced wholesale by the background worker.
///
/// Readers take an `Arc` snapshot; a reader never sees a half-installed
/// composite.
#[derive(Debug)]
pub struct RasterLayer {
    entry: LayerEntry,
    composite: RwLock<Arc<CompositeImage>>,
    installs: AtomicU64,
}

impl RasterLayer {
    /// Creates the layer showing a transparent placeholder.
    pub fn new(name: impl Into<String>, extent: Extent, crs: Crs) -> Self {
        Self {
            entry: LayerEntry::new(name, LayerKind::Raster),
            composite: RwLock::new(Arc::new(CompositeImage::placeholder(extent, crs))),
            installs: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> LayerId {
        self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Tree entry to hand to the canvas.
    pub fn entry(&self) -> LayerEntry {
        self.entry.clone()
    }

    /// Current composite.
    pub fn composite(&self) -> Arc<CompositeImage> {
        Arc::clone(&self.composite.read())
    }

    /// Replaces the composite.
    pub fn install(&self, composite: CompositeImage) {
        *self.composite.write() = Arc::new(composite);
        self.installs.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of composites installed since creation.
    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::SeqCst)
    }

    /// True until the first composite is installed.
    pub fn is_placeholder(&self) -> bool {
        self.install_count() == 0
    }
}
