//! Host map canvas interface
//!
//! The basemap pipeline never draws to screen itself. It talks to the host
//! map through [`MapCanvas`]: reading the viewport, toggling the busy
//! indicator, adjusting the projection and extent, editing the layer tree and
//! subscribing to [`CanvasEvent`]s. [`MemoryCanvas`] is an in-process
//! implementation used by the CLI and the tests.

mod memory;
mod tree;

pub use memory::MemoryCanvas;
pub use tree::{LayerEntry, LayerId, LayerKind, LayerNode, LayerTree};

use tokio::sync::broadcast;

use crate::coord::{Extent, PixelRect};
use crate::reproject::Crs;

/// Capacity of the canvas event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications emitted by the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// The visible extent, projection or pixel size changed.
    ViewportChanged { extent: Extent },
    /// A layer was removed from the layer tree by someone other than the
    /// basemap manager.
    LayerRemoved { id: LayerId },
}

/// The host map canvas.
///
/// All methods take `&self`; implementations synchronise internally so that
/// the background worker and the control side can share one canvas.
pub trait MapCanvas: Send + Sync {
    /// Current visible extent in [`MapCanvas::crs`] coordinates.
    fn extent(&self) -> Extent;

    /// Projection of the canvas.
    fn crs(&self) -> Crs;

    /// Size of the drawing surface.
    fn pixel_size(&self) -> PixelRect;

    /// Margin in pixels along each edge that the host renders but does not
    /// show.
    fn edge_buffer(&self) -> u32 {
        0
    }

    /// Sets the extent, emitting [`CanvasEvent::ViewportChanged`].
    fn set_extent(&self, extent: Extent);

    /// Switches projection without touching the extent.
    fn set_crs(&self, crs: Crs);

    /// Sets the busy indicator if it is clear. Returns true when this call
    /// set it, making the caller responsible for clearing it.
    fn try_mark_busy(&self) -> bool;

    fn clear_busy(&self);

    fn is_busy(&self) -> bool;

    /// Requests a repaint.
    fn invalidate(&self);

    /// Adds a layer on top of the tree.
    fn add_layer(&self, layer: LayerEntry);

    /// Adds a layer beneath everything else.
    fn add_layer_bottom(&self, layer: LayerEntry);

    /// Removes a layer wherever it sits in the tree. Does not emit
    /// [`CanvasEvent::LayerRemoved`].
    fn remove_layer(&self, id: LayerId) -> Option<LayerEntry>;

    fn contains_layer(&self, id: LayerId) -> bool;

    /// Number of layers, not counting groups.
    fn layer_count(&self) -> usize;

    fn subscribe(&self) -> broadcast::Receiver<CanvasEvent>;
}
