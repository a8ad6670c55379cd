//! Fetch-stitch orchestration
//!
//! [`BasemapOrchestrator`] turns viewport changes into background jobs that
//! fetch tiles for the visible area, stitch them into one composite and
//! install it on the basemap raster layer.
//!
//! # Worker slot
//!
//! There is a single worker slot. [`BasemapOrchestrator::request_update`]
//! starts a job when the slot is idle. When a job is already running it
//! cancels that job and marks a restart: as soon as the job exits, a fresh job
//! runs against the then-current viewport. Requests are never dropped, and a
//! burst of requests collapses into one trailing job.
//!
//! ```text
//! Idle ──request──► Running ──┬─► Completed ─┐
//!                     ▲       ├─► Cancelled ─┼─ restart pending? ──► Running
//!                     │       └─► Failed ────┘          │ no
//!                     └──────────────────────────────── ▼
//!                                                  (slot idle)
//! ```
//!
//! # Checkpoints
//!
//! Progress is reported at 10/25/40/50/70/90/99 percent. Each report first
//! checks the job's cancellation token, so a cancelled job stops at the next
//! milestone and never installs a partial result.

mod types;

pub use types::{JobError, JobOutcome, JobState, JobSummary};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canvas::MapCanvas;
use crate::coord::{Extent, GeoEnvelope, PixelRect};
use crate::layer::{CompositeImage, RasterLayer};
use crate::progress::ProgressSink;
use crate::provider::{FetchError, TileSource};
use crate::reproject::{reproject, Crs};
use crate::stitch::stitch;

/// Opacity used until one is set.
pub const DEFAULT_OPACITY: u8 = 100;

#[derive(Default)]
struct Slot {
    state: JobState,
    restart_pending: bool,
    token: Option<CancellationToken>,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
}

struct Inner {
    canvas: Arc<dyn MapCanvas>,
    layer: Arc<RasterLayer>,
    progress: Arc<dyn ProgressSink>,
    source: RwLock<Option<Arc<dyn TileSource>>>,
    opacity: AtomicU8,
    slot: Mutex<Slot>,
    last_outcome: Mutex<Option<JobOutcome>>,
    counters: Counters,
    idle: Notify,
    shutdown: CancellationToken,
}

/// Single-slot background worker that keeps the basemap layer current.
///
/// Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct BasemapOrchestrator {
    inner: Arc<Inner>,
}

impl BasemapOrchestrator {
    pub fn new(
        canvas: Arc<dyn MapCanvas>,
        layer: Arc<RasterLayer>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                canvas,
                layer,
                progress,
                source: RwLock::new(None),
                opacity: AtomicU8::new(DEFAULT_OPACITY),
                slot: Mutex::new(Slot::default()),
                last_outcome: Mutex::new(None),
                counters: Counters::default(),
                idle: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn with_source(self, source: Arc<dyn TileSource>) -> Self {
        self.set_source(Some(source));
        self
    }

    pub fn with_opacity(self, opacity: u8) -> Self {
        self.set_opacity(opacity);
        self
    }

    /// Replaces the tile source used by subsequent jobs.
    pub fn set_source(&self, source: Option<Arc<dyn TileSource>>) {
        *self.inner.source.write() = source;
    }

    pub fn source(&self) -> Option<Arc<dyn TileSource>> {
        self.inner.source.read().clone()
    }

    /// Sets the opacity (clamped to 100) applied by subsequent stitches.
    pub fn set_opacity(&self, opacity: u8) {
        self.inner.opacity.store(opacity.min(100), Ordering::SeqCst);
    }

    pub fn opacity(&self) -> u8 {
        self.inner.opacity.load(Ordering::SeqCst)
    }

    pub fn layer(&self) -> &Arc<RasterLayer> {
        &self.inner.layer
    }

    pub fn state(&self) -> JobState {
        self.inner.slot.lock().state
    }

    pub fn is_idle(&self) -> bool {
        self.state().is_idle()
    }

    pub fn last_outcome(&self) -> Option<JobOutcome> {
        self.inner.last_outcome.lock().clone()
    }

    pub fn stats(&self) -> OrchestratorStats {
        let c = &self.inner.counters;
        OrchestratorStats {
            started: c.started.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::SeqCst),
            cancelled: c.cancelled.load(Ordering::SeqCst),
            failed: c.failed.load(Ordering::SeqCst),
        }
    }

    /// Asks for the composite to be rebuilt for the current viewport.
    ///
    /// Starts a job if the slot is idle; otherwise cancels the running job
    /// and schedules a restart. Must be called from within a Tokio runtime.
    pub fn request_update(&self) {
        if self.inner.shutdown.is_cancelled() {
            debug!("Orchestrator shut down, ignoring update request");
            return;
        }

        let mut slot = self.inner.slot.lock();
        if slot.state == JobState::Running {
            slot.restart_pending = true;
            if let Some(token) = &slot.token {
                token.cancel();
            }
            debug!("Job in flight, cancelling for restart");
            return;
        }

        let token = self.inner.shutdown.child_token();
        slot.state = JobState::Running;
        slot.restart_pending = false;
        slot.token = Some(token.clone());
        drop(slot);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_worker(token).await });
    }

    /// Waits until no job is in flight, including pending restarts.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Cancels any running job and refuses further requests.
    pub fn shutdown(&self) {
        info!("Basemap orchestrator shutting down");
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// Runs jobs until one ends without a restart pending.
    async fn run_worker(self: Arc<Self>, mut token: CancellationToken) {
        loop {
            let outcome = self.run_job(&token).await;
            self.record(&outcome);

            let restart = {
                let mut slot = self.slot.lock();
                if slot.restart_pending && !self.shutdown.is_cancelled() {
                    let next = self.shutdown.child_token();
                    slot.restart_pending = false;
                    slot.token = Some(next.clone());
                    Some(next)
                } else {
                    slot.state = outcome.state();
                    slot.restart_pending = false;
                    slot.token = None;
                    None
                }
            };

            match restart {
                Some(next) => {
                    debug!("Restarting job for latest viewport");
                    token = next;
                }
                None => {
                    self.idle.notify_waiters();
                    return;
                }
            }
        }
    }

    async fn run_job(&self, token: &CancellationToken) -> JobOutcome {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let owns_busy = self.canvas.try_mark_busy();

        // A panicking collaborator must still release the busy flag and the slot
        let result = match AssertUnwindSafe(self.execute(token)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(JobError::Worker(panic_message(payload.as_ref()))),
        };

        if owns_busy {
            self.canvas.clear_busy();
        }
        self.progress.reset();
        self.canvas.invalidate();

        match result {
            Ok(summary) => {
                info!(
                    zoom = summary.zoom,
                    tiles = summary.tiles,
                    failed_tiles = summary.failed_tiles,
                    width = summary.width,
                    height = summary.height,
                    "Basemap composite installed"
                );
                JobOutcome::Completed(summary)
            }
            Err(JobError::Cancelled) => {
                debug!("Job cancelled");
                JobOutcome::Cancelled
            }
            Err(e) => {
                warn!(error = %e, "Basemap job failed");
                self.progress.error(&e.to_string());
                JobOutcome::Failed(e)
            }
        }
    }

    fn record(&self, outcome: &JobOutcome) {
        let counter = match outcome {
            JobOutcome::Completed(_) => &self.counters.completed,
            JobOutcome::Cancelled => &self.counters.cancelled,
            JobOutcome::Failed(_) => &self.counters.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        *self.last_outcome.lock() = Some(outcome.clone());
    }

    /// Reports progress after checking for cancellation.
    fn checkpoint(
        &self,
        token: &CancellationToken,
        percent: u8,
        message: &str,
    ) -> Result<(), JobError> {
        if token.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        self.progress.report(percent, message);
        Ok(())
    }

    async fn execute(&self, token: &CancellationToken) -> Result<JobSummary, JobError> {
        self.checkpoint(token, 10, "Reading viewport")?;
        let source = self.source.read().clone().ok_or(JobError::NoSource)?;

        let crs = self.canvas.crs();
        let pixels = self.canvas.pixel_size();
        if pixels.is_empty() {
            return Err(JobError::EmptyViewport {
                width: pixels.width,
                height: pixels.height,
            });
        }
        let (extent, pixels) =
            apply_edge_buffer(self.canvas.extent(), pixels, self.canvas.edge_buffer());
        let clamped = clamp_to_crs(&extent, &crs);

        self.checkpoint(token, 25, "Reprojecting viewport")?;
        let envelope = viewport_envelope(&clamped, &crs)?;
        debug!(
            %clamped,
            %envelope,
            width = pixels.width,
            height = pixels.height,
            "Viewport resolved"
        );

        self.checkpoint(token, 40, "Fetching tiles")?;
        let tile_set = source.get_tiles(envelope, pixels, token).await?;

        self.checkpoint(token, 50, "Stitching tiles")?;
        let footprint = *tile_set.footprint();
        let failed_tiles = tile_set.failed_count();
        let covered = tile_set
            .covered_envelope()
            .ok_or(JobError::Fetch(FetchError::NoTiles(envelope)))?;
        let tiles = tile_set.into_tiles();
        let tile_count = tiles.len();
        let opacity = self.opacity.load(Ordering::SeqCst);
        let image = tokio::task::spawn_blocking(move || stitch(&tiles, opacity))
            .await
            .map_err(|e| JobError::Worker(e.to_string()))??;

        self.checkpoint(token, 70, "Positioning composite")?;
        let composite_extent = composite_extent(&covered, &crs)?;

        self.checkpoint(token, 90, "Preparing composite")?;
        let summary = JobSummary {
            zoom: footprint.zoom,
            tiles: tile_count,
            failed_tiles,
            width: image.width(),
            height: image.height(),
            extent: composite_extent,
        };

        self.checkpoint(token, 99, "Installing composite")?;
        self.layer
            .install(CompositeImage::new(image, composite_extent, crs));
        Ok(summary)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {}", message)
    } else {
        "job panicked".to_string()
    }
}

/// Shrinks the query area by the canvas edge buffer.
///
/// The extent loses `margin` pixels' worth of map units on every side and
/// the pixel rectangle loses `2 * margin` on each axis. A margin that would
/// consume the whole surface is ignored.
pub fn apply_edge_buffer(extent: Extent, pixels: PixelRect, margin: u32) -> (Extent, PixelRect) {
    if margin == 0
        || pixels.is_empty()
        || margin.saturating_mul(2) >= pixels.width
        || margin.saturating_mul(2) >= pixels.height
    {
        return (extent, pixels);
    }

    let units_x = extent.width() / pixels.width as f64;
    let units_y = extent.height() / pixels.height as f64;
    let shrunk = extent.shrink(margin as f64 * units_x, margin as f64 * units_y);
    (
        shrunk,
        PixelRect::new(pixels.width - 2 * margin, pixels.height - 2 * margin),
    )
}

/// Clips an extent to the range over which `crs` maps into the tiling space.
/// Systems with unknown bounds pass through unchanged.
pub fn clamp_to_crs(extent: &Extent, crs: &Crs) -> Extent {
    match crs.valid_bounds() {
        Some(bounds) => extent.clamp_to(&bounds),
        None => *extent,
    }
}

/// Reprojects the four corners of a display-space extent to a geographic
/// envelope.
pub fn viewport_envelope(extent: &Extent, crs: &Crs) -> Result<GeoEnvelope, JobError> {
    let corners = reproject(&extent.corners(), None, crs, &Crs::Geographic)?;
    let corners = [corners[0], corners[1], corners[2], corners[3]];
    Ok(GeoEnvelope::from_corners(&corners))
}

/// Reprojects the covered geographic envelope back to display space.
pub fn composite_extent(covered: &GeoEnvelope, crs: &Crs) -> Result<Extent, JobError> {
    let corners = reproject(
        &[(covered.west, covered.north), (covered.east, covered.south)],
        None,
        &Crs::Geographic,
        crs,
    )?;
    Ok(Extent::new(
        corners[0].0,
        corners[0].1,
        corners[1].0,
        corners[1].1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::MemoryCanvas;
    use crate::coord::{WEB_MERCATOR_MAX, WEB_MERCATOR_MIN};
    use crate::grid::TileGrid;
    use crate::progress::RecordingProgress;
    use crate::provider::{SolidColorSource, Tile, TileSet};
    use futures::future::BoxFuture;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    /// Serves solid tiles from a default grid, optionally after a delay.
    struct SolidSource {
        grid: TileGrid,
        delay: Duration,
        fail: bool,
        calls: AtomicU64,
    }

    impl SolidSource {
        fn new() -> Self {
            Self {
                grid: TileGrid::default(),
                delay: Duration::ZERO,
                fail: false,
                calls: AtomicU64::new(0),
            }
        }
    }

    impl TileSource for SolidSource {
        fn name(&self) -> &str {
            "solid"
        }

        fn get_tiles<'a>(
            &'a self,
            envelope: GeoEnvelope,
            pixels: PixelRect,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<TileSet, FetchError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                if self.fail {
                    return Err(FetchError::NoTiles(envelope));
                }
                let footprint = self.grid.footprint(&envelope, pixels);
                let tiles = footprint
                    .tiles()
                    .map(|cell| {
                        Tile::new(cell, 256, RgbaImage::from_pixel(256, 256, Rgba([0, 0, 255, 255])))
                    })
                    .collect();
                Ok(TileSet::new(footprint, tiles))
            })
        }
    }

    fn setup(
        source: SolidSource,
    ) -> (Arc<MemoryCanvas>, Arc<RecordingProgress>, BasemapOrchestrator) {
        let canvas = Arc::new(MemoryCanvas::new(
            Crs::WebMercator,
            Extent::tiling_space(),
            PixelRect::new(512, 512),
        ));
        let progress = Arc::new(RecordingProgress::new());
        let layer = Arc::new(RasterLayer::new("Basemap", Extent::tiling_space(), Crs::WebMercator));
        let orchestrator = BasemapOrchestrator::new(canvas.clone(), layer, progress.clone())
            .with_source(Arc::new(source));
        (canvas, progress, orchestrator)
    }

    #[tokio::test]
    async fn test_single_job_installs_composite() {
        let (canvas, progress, orchestrator) = setup(SolidSource::new());

        orchestrator.request_update();
        orchestrator.wait_idle().await;

        assert_eq!(orchestrator.state(), JobState::Completed);
        let composite = orchestrator.layer().composite();
        assert_eq!((composite.width(), composite.height()), (512, 512));
        assert!((composite.extent.max_x - WEB_MERCATOR_MAX).abs() < 1e-3);
        assert!((composite.extent.min_y - WEB_MERCATOR_MIN).abs() < 1e-3);

        assert_eq!(progress.percentages(), vec![10, 25, 40, 50, 70, 90, 99]);
        assert!(!canvas.is_busy());
        assert!(canvas.repaint_count() >= 1);
    }

    #[tokio::test]
    async fn test_burst_collapses_to_one_trailing_job() {
        let mut source = SolidSource::new();
        source.delay = Duration::from_millis(20);
        let (canvas, _progress, orchestrator) = setup(source);

        for i in 0..5 {
            let half = 1.0e6 * (i + 1) as f64;
            canvas.pan_to(Extent::new(-half, -half, half, half));
            orchestrator.request_update();
        }
        orchestrator.wait_idle().await;

        let stats = orchestrator.stats();
        assert_eq!(stats.completed, 1, "stats: {:?}", stats);
        assert_eq!(orchestrator.layer().install_count(), 1);
        assert_eq!(orchestrator.state(), JobState::Completed);

        // The installed composite covers the last viewport
        let extent = orchestrator.layer().composite().extent;
        assert!(extent.min_x <= -5.0e6 && extent.max_x >= 5.0e6);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_composite() {
        let (_canvas, progress, orchestrator) = setup(SolidSource::new());
        orchestrator.request_update();
        orchestrator.wait_idle().await;
        let installed = orchestrator.layer().composite();

        let mut failing = SolidSource::new();
        failing.fail = true;
        orchestrator.set_source(Some(Arc::new(failing)));
        orchestrator.request_update();
        orchestrator.wait_idle().await;

        assert_eq!(orchestrator.state(), JobState::Failed);
        assert!(matches!(
            orchestrator.last_outcome(),
            Some(JobOutcome::Failed(JobError::Fetch(FetchError::NoTiles(_))))
        ));
        assert_eq!(orchestrator.layer().composite(), installed);
        assert_eq!(progress.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_no_source_fails() {
        let canvas = Arc::new(MemoryCanvas::new(
            Crs::WebMercator,
            Extent::tiling_space(),
            PixelRect::new(256, 256),
        ));
        let layer = Arc::new(RasterLayer::new("Basemap", Extent::tiling_space(), Crs::WebMercator));
        let orchestrator =
            BasemapOrchestrator::new(canvas, layer, Arc::new(RecordingProgress::new()));

        orchestrator.request_update();
        orchestrator.wait_idle().await;
        assert!(matches!(
            orchestrator.last_outcome(),
            Some(JobOutcome::Failed(JobError::NoSource))
        ));
    }

    #[tokio::test]
    async fn test_busy_flag_not_cleared_when_not_owned() {
        let (canvas, _progress, orchestrator) = setup(SolidSource::new());
        assert!(canvas.try_mark_busy());

        orchestrator.request_update();
        orchestrator.wait_idle().await;

        assert!(canvas.is_busy(), "job must not clear a flag it did not set");
    }

    #[tokio::test]
    async fn test_opacity_applied() {
        let (_canvas, _progress, orchestrator) = setup(SolidSource::new());
        orchestrator.set_opacity(0);
        orchestrator.request_update();
        orchestrator.wait_idle().await;

        let composite = orchestrator.layer().composite();
        assert!(composite.image.pixels().all(|p| p.0[3] == 0));
        orchestrator.set_opacity(250);
        assert_eq!(orchestrator.opacity(), 100);
    }

    #[tokio::test]
    async fn test_shutdown_ignores_requests() {
        let (_canvas, _progress, orchestrator) = setup(SolidSource::new());
        orchestrator.shutdown();
        orchestrator.request_update();
        orchestrator.wait_idle().await;
        assert_eq!(orchestrator.state(), JobState::Idle);
        assert_eq!(orchestrator.stats().started, 0);
    }

    /// Panics inside the fetch.
    struct PanickingSource;

    impl TileSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        fn get_tiles<'a>(
            &'a self,
            _envelope: GeoEnvelope,
            _pixels: PixelRect,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<TileSet, FetchError>> {
            Box::pin(async move { explode() })
        }
    }

    fn explode() -> Result<TileSet, FetchError> {
        panic!("tile server exploded")
    }

    fn orchestrate(
        canvas: Arc<MemoryCanvas>,
        source: Arc<dyn TileSource>,
    ) -> (Arc<RecordingProgress>, BasemapOrchestrator) {
        let progress = Arc::new(RecordingProgress::new());
        let crs = canvas.crs();
        let layer = Arc::new(RasterLayer::new("Basemap", canvas.extent(), crs));
        let orchestrator =
            BasemapOrchestrator::new(canvas, layer, progress.clone()).with_source(source);
        (progress, orchestrator)
    }

    #[tokio::test]
    async fn test_panicking_source_fails_job_and_frees_slot() {
        let canvas = Arc::new(MemoryCanvas::new(
            Crs::WebMercator,
            Extent::tiling_space(),
            PixelRect::new(256, 256),
        ));
        let (progress, orchestrator) = orchestrate(canvas.clone(), Arc::new(PanickingSource));

        orchestrator.request_update();
        tokio::time::timeout(Duration::from_millis(500), orchestrator.wait_idle())
            .await
            .expect("slot must become idle after a panic");

        assert_eq!(orchestrator.state(), JobState::Failed);
        match orchestrator.last_outcome() {
            Some(JobOutcome::Failed(JobError::Worker(message))) => {
                assert!(message.contains("tile server exploded"), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!canvas.is_busy());
        assert_eq!(progress.errors().len(), 1);

        // The slot accepts new work
        orchestrator.set_source(Some(Arc::new(SolidSource::new())));
        orchestrator.request_update();
        tokio::time::timeout(Duration::from_millis(500), orchestrator.wait_idle())
            .await
            .unwrap();
        assert_eq!(orchestrator.state(), JobState::Completed);
        assert_eq!(orchestrator.layer().install_count(), 1);
        assert_eq!(orchestrator.stats().started, 2);
    }

    #[tokio::test]
    async fn test_job_requests_edge_buffered_viewport() {
        let canvas = Arc::new(
            MemoryCanvas::new(
                Crs::WebMercator,
                Extent::new(-1.0e6, -1.0e6, 1.0e6, 1.0e6),
                PixelRect::new(600, 600),
            )
            .with_edge_buffer(100),
        );
        let source = Arc::new(SolidColorSource::new("Blue", Rgba([0, 0, 255, 255])));
        let (_progress, orchestrator) = orchestrate(canvas, source.clone());

        orchestrator.request_update();
        orchestrator.wait_idle().await;
        assert_eq!(orchestrator.state(), JobState::Completed);

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        let (envelope, pixels) = requests[0];
        assert_eq!(pixels, PixelRect::new(400, 400));

        // 100 px of 600 trimmed from each side of a 2000 km wide view
        let half_width_m: f64 = 1.0e6 * 400.0 / 600.0;
        let half_width_deg = (half_width_m / 6_378_137.0).to_degrees();
        assert!((envelope.east - half_width_deg).abs() < 1e-6, "{}", envelope);
        assert!((envelope.west + half_width_deg).abs() < 1e-6, "{}", envelope);

        let extent = orchestrator.layer().composite().extent;
        assert!(extent.contains(&Extent::new(-half_width_m, -half_width_m, half_width_m, half_width_m)));
    }

    #[tokio::test]
    async fn test_antimeridian_viewport_stitches_continuous_composite() {
        let crs = Crs::Proj(
            "+proj=merc +lon_0=180 +a=6378137 +b=6378137 +units=m +no_defs".into(),
        );
        let viewport = Extent::new(-1.0e6, -1.0e6, 1.0e6, 1.0e6);
        let canvas = Arc::new(MemoryCanvas::new(crs, viewport, PixelRect::new(512, 512)));
        let source = Arc::new(SolidColorSource::new("Blue", Rgba([0, 0, 255, 255])));
        let (_progress, orchestrator) = orchestrate(canvas, source.clone());

        orchestrator.request_update();
        orchestrator.wait_idle().await;
        assert_eq!(orchestrator.state(), JobState::Completed, "{:?}", orchestrator.last_outcome());

        let (envelope, _) = source.requests()[0];
        assert!(envelope.crosses_antimeridian(), "{}", envelope);
        assert!(envelope.west > 170.0 && envelope.east < -170.0, "{}", envelope);

        let composite = orchestrator.layer().composite();
        assert_eq!((composite.width(), composite.height()), (1024, 1024));

        // Four zoom-6 tiles wide, centred on the anti-meridian
        let tile_width = 2.0 * WEB_MERCATOR_MAX / 64.0;
        let extent = composite.extent;
        assert!(extent.min_x < extent.max_x);
        assert!((extent.width() - 4.0 * tile_width).abs() < 1.0, "{}", extent);
        assert!(extent.contains(&viewport), "{}", extent);
    }

    #[test]
    fn test_edge_buffer_shrinks_extent_and_pixels() {
        let extent = Extent::new(0.0, 0.0, 1000.0, 500.0);
        let (shrunk, pixels) = apply_edge_buffer(extent, PixelRect::new(100, 50), 10);
        assert_eq!(pixels, PixelRect::new(80, 30));
        assert_eq!(shrunk, Extent::new(100.0, 100.0, 900.0, 400.0));
    }

    #[test]
    fn test_edge_buffer_too_large_is_ignored() {
        let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
        let pixels = PixelRect::new(20, 20);
        assert_eq!(apply_edge_buffer(extent, pixels, 10), (extent, pixels));
    }

    #[test]
    fn test_clamp_to_crs() {
        let huge = Extent::new(-3.0e7, -3.0e7, 3.0e7, 3.0e7);
        assert_eq!(clamp_to_crs(&huge, &Crs::WebMercator), Extent::tiling_space());

        let custom = Crs::Proj("+proj=utm +zone=33 +ellps=WGS84".into());
        assert_eq!(clamp_to_crs(&huge, &custom), huge);
    }

    #[test]
    fn test_viewport_envelope_of_tiling_space_is_world() {
        let envelope = viewport_envelope(&Extent::tiling_space(), &Crs::WebMercator).unwrap();
        assert!((envelope.west + 180.0).abs() < 1e-9);
        assert!((envelope.east - 180.0).abs() < 1e-9);
        assert!((envelope.north - 85.05112878).abs() < 1e-6);
    }
}
