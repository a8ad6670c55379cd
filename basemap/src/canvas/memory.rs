//! In-process canvas implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::trace;

use super::{CanvasEvent, LayerEntry, LayerId, LayerTree, MapCanvas, EVENT_CHANNEL_CAPACITY};
use crate::coord::{Extent, PixelRect};
use crate::reproject::Crs;

#[derive(Debug, Clone)]
struct View {
    extent: Extent,
    crs: Crs,
    pixels: PixelRect,
}

/// A canvas that keeps its state in memory.
///
/// Besides the [`MapCanvas`] interface it offers host-side operations
/// (panning, resizing, editing the layer tree as a user would) for driving
/// the pipeline without a GUI.
pub struct MemoryCanvas {
    view: RwLock<View>,
    edge_buffer: u32,
    busy: AtomicBool,
    repaints: AtomicU64,
    layers: Mutex<LayerTree>,
    events: broadcast::Sender<CanvasEvent>,
}

impl MemoryCanvas {
    pub fn new(crs: Crs, extent: Extent, pixels: PixelRect) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            view: RwLock::new(View {
                extent,
                crs,
                pixels,
            }),
            edge_buffer: 0,
            busy: AtomicBool::new(false),
            repaints: AtomicU64::new(0),
            layers: Mutex::new(LayerTree::new()),
            events,
        }
    }

    pub fn with_edge_buffer(mut self, pixels: u32) -> Self {
        self.edge_buffer = pixels;
        self
    }

    /// Moves the viewport, as a user pan or zoom would.
    pub fn pan_to(&self, extent: Extent) {
        self.set_extent(extent);
    }

    /// Resizes the drawing surface.
    pub fn resize(&self, pixels: PixelRect) {
        let extent = {
            let mut view = self.view.write();
            view.pixels = pixels;
            view.extent
        };
        self.emit(CanvasEvent::ViewportChanged { extent });
    }

    /// Runs `f` against the layer tree, as the host's layer panel would.
    pub fn with_layers<R>(&self, f: impl FnOnce(&mut LayerTree) -> R) -> R {
        f(&mut self.layers.lock())
    }

    /// Removes a layer on behalf of the user and announces the removal.
    pub fn remove_layer_externally(&self, id: LayerId) -> Option<LayerEntry> {
        let removed = self.layers.lock().remove(id);
        if removed.is_some() {
            self.emit(CanvasEvent::LayerRemoved { id });
        }
        removed
    }

    /// Number of repaint requests received.
    pub fn repaint_count(&self) -> u64 {
        self.repaints.load(Ordering::SeqCst)
    }

    fn emit(&self, event: CanvasEvent) {
        trace!(?event, "Canvas event");
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

impl MapCanvas for MemoryCanvas {
    fn extent(&self) -> Extent {
        self.view.read().extent
    }

    fn crs(&self) -> Crs {
        self.view.read().crs.clone()
    }

    fn pixel_size(&self) -> PixelRect {
        self.view.read().pixels
    }

    fn edge_buffer(&self) -> u32 {
        self.edge_buffer
    }

    fn set_extent(&self, extent: Extent) {
        self.view.write().extent = extent;
        self.emit(CanvasEvent::ViewportChanged { extent });
    }

    fn set_crs(&self, crs: Crs) {
        self.view.write().crs = crs;
    }

    fn try_mark_busy(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn clear_busy(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn invalidate(&self) {
        self.repaints.fetch_add(1, Ordering::SeqCst);
    }

    fn add_layer(&self, layer: LayerEntry) {
        self.layers.lock().add_layer(layer);
    }

    fn add_layer_bottom(&self, layer: LayerEntry) {
        self.layers.lock().add_layer_bottom(layer);
    }

    fn remove_layer(&self, id: LayerId) -> Option<LayerEntry> {
        self.layers.lock().remove(id)
    }

    fn contains_layer(&self, id: LayerId) -> bool {
        self.layers.lock().contains(id)
    }

    fn layer_count(&self) -> usize {
        self.layers.lock().layer_count()
    }

    fn subscribe(&self) -> broadcast::Receiver<CanvasEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::LayerKind;

    fn canvas() -> MemoryCanvas {
        MemoryCanvas::new(
            Crs::WebMercator,
            Extent::new(0.0, 0.0, 1000.0, 1000.0),
            PixelRect::new(100, 100),
        )
    }

    #[test]
    fn test_busy_flag_single_owner() {
        let canvas = canvas();
        assert!(canvas.try_mark_busy());
        assert!(!canvas.try_mark_busy());
        assert!(canvas.is_busy());
        canvas.clear_busy();
        assert!(!canvas.is_busy());
    }

    #[tokio::test]
    async fn test_pan_emits_viewport_changed() {
        let canvas = canvas();
        let mut events = canvas.subscribe();
        let extent = Extent::new(10.0, 10.0, 20.0, 20.0);

        canvas.pan_to(extent);

        assert_eq!(canvas.extent(), extent);
        assert_eq!(
            events.recv().await.unwrap(),
            CanvasEvent::ViewportChanged { extent }
        );
    }

    #[tokio::test]
    async fn test_external_removal_emits_event() {
        let canvas = canvas();
        let mut events = canvas.subscribe();
        let layer = LayerEntry::new("basemap", LayerKind::Raster);
        let id = layer.id;
        canvas.add_layer(layer);

        assert!(canvas.remove_layer_externally(id).is_some());
        assert_eq!(events.recv().await.unwrap(), CanvasEvent::LayerRemoved { id });
        assert!(canvas.remove_layer_externally(id).is_none());
    }

    #[test]
    fn test_silent_removal() {
        let canvas = canvas();
        let mut events = canvas.subscribe();
        let layer = LayerEntry::new("basemap", LayerKind::Raster);
        let id = layer.id;
        canvas.add_layer(layer);

        assert!(canvas.remove_layer(id).is_some());
        assert!(events.try_recv().is_err());
        assert_eq!(canvas.layer_count(), 0);
    }

    #[test]
    fn test_invalidate_counts() {
        let canvas = canvas();
        canvas.invalidate();
        canvas.invalidate();
        assert_eq!(canvas.repaint_count(), 2);
    }
}
