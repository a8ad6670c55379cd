//! Basemap layer lifecycle.
//!
//! [`BasemapManager`] owns everything that exists while a basemap is shown:
//! the raster layer, an optional placeholder layer, the orchestrator and the
//! task forwarding canvas events to it. Enabling a provider builds them;
//! disabling (or the user deleting the raster layer) tears them down.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::canvas::{CanvasEvent, LayerEntry, LayerId, LayerKind, MapCanvas};
use crate::config::DEFAULT_SETTINGS_PREFIX;
use crate::coord::Extent;
use crate::orchestrator::{clamp_to_crs, BasemapOrchestrator};
use crate::progress::ProgressSink;
use crate::provider::{FetchError, SourceFactory, NO_PROVIDER};
use crate::reproject::{reproject, Crs, ReprojectionError};
use crate::settings::{ProjectSettings, SettingsError};

use super::raster::RasterLayer;
use super::selection::BasemapSelection;

/// Name given to the raster layer.
pub const DEFAULT_LAYER_NAME: &str = "Basemap";

/// Name given to the hidden layer that spans the tiling space on an empty map.
pub const PLACEHOLDER_LAYER_NAME: &str = "Basemap extent";

/// Errors from basemap control operations.
#[derive(Debug, Error)]
pub enum BasemapError {
    #[error(transparent)]
    Source(#[from] FetchError),

    #[error("Cannot switch the canvas to Web Mercator: {0}")]
    Reprojection(#[from] ReprojectionError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Pipeline pieces that live while a basemap is enabled.
struct Active {
    layer: Arc<RasterLayer>,
    orchestrator: BasemapOrchestrator,
    placeholder: Option<LayerId>,
    listener: CancellationToken,
}

struct State {
    selection: BasemapSelection,
    active: Option<Active>,
}

struct Inner {
    canvas: Arc<dyn MapCanvas>,
    factory: Arc<dyn SourceFactory>,
    progress: Arc<dyn ProgressSink>,
    layer_name: String,
    settings_prefix: String,
    state: Mutex<State>,
}

/// Builder for [`BasemapManager`].
pub struct BasemapManagerBuilder {
    canvas: Arc<dyn MapCanvas>,
    factory: Arc<dyn SourceFactory>,
    progress: Arc<dyn ProgressSink>,
    layer_name: String,
    settings_prefix: String,
}

impl BasemapManagerBuilder {
    pub fn with_layer_name(mut self, name: impl Into<String>) -> Self {
        self.layer_name = name.into();
        self
    }

    pub fn with_settings_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings_prefix = prefix.into();
        self
    }

    pub fn build(self) -> BasemapManager {
        BasemapManager {
            inner: Arc::new(Inner {
                canvas: self.canvas,
                factory: self.factory,
                progress: self.progress,
                layer_name: self.layer_name,
                settings_prefix: self.settings_prefix,
                state: Mutex::new(State {
                    selection: BasemapSelection::default(),
                    active: None,
                }),
            }),
        }
    }
}

/// Controls whether and which basemap is shown on a canvas.
///
/// Cloning yields another handle to the same manager. Operations that enable
/// a provider spawn tasks and must run inside a Tokio runtime.
#[derive(Clone)]
pub struct BasemapManager {
    inner: Arc<Inner>,
}

impl BasemapManager {
    pub fn new(
        canvas: Arc<dyn MapCanvas>,
        factory: Arc<dyn SourceFactory>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::builder(canvas, factory, progress).build()
    }

    /// Starts a manager with non-default layer name or settings prefix.
    pub fn builder(
        canvas: Arc<dyn MapCanvas>,
        factory: Arc<dyn SourceFactory>,
        progress: Arc<dyn ProgressSink>,
    ) -> BasemapManagerBuilder {
        BasemapManagerBuilder {
            canvas,
            factory,
            progress,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            settings_prefix: DEFAULT_SETTINGS_PREFIX.to_string(),
        }
    }

    /// Name of the raster layer this manager adds.
    pub fn layer_name(&self) -> &str {
        &self.inner.layer_name
    }

    /// Prefix of the project settings keys this manager reads and writes.
    pub fn settings_prefix(&self) -> &str {
        &self.inner.settings_prefix
    }

    pub fn selection(&self) -> BasemapSelection {
        self.inner.state.lock().selection.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }

    /// Provider names the factory offers.
    pub fn available_providers(&self) -> Vec<String> {
        self.inner.factory.available()
    }

    /// The raster layer while a basemap is enabled.
    pub fn layer(&self) -> Option<Arc<RasterLayer>> {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .map(|a| Arc::clone(&a.layer))
    }

    /// The placeholder layer id, if one was added.
    pub fn placeholder_layer(&self) -> Option<LayerId> {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .and_then(|a| a.placeholder)
    }

    pub fn orchestrator(&self) -> Option<BasemapOrchestrator> {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .map(|a| a.orchestrator.clone())
    }

    /// Shows `provider`, or switches to it if a basemap is already shown.
    /// The [`NO_PROVIDER`] sentinel disables the basemap.
    pub fn set_provider(&self, provider: &str) -> Result<(), BasemapError> {
        let provider = provider.trim();
        if provider.is_empty() || provider.eq_ignore_ascii_case(NO_PROVIDER) {
            self.disable();
            return Ok(());
        }
        self.enable(provider)
    }

    /// Shows `provider`.
    ///
    /// On first enable the raster layer goes to the bottom of the layer
    /// tree and the canvas is switched to Web Mercator if needed. On an empty
    /// map a hidden placeholder layer is added and the view zooms to the
    /// whole tiling space.
    pub fn enable(&self, provider: &str) -> Result<(), BasemapError> {
        let source = self.inner.factory.create(provider)?;
        let name = source.name().to_string();
        let canvas = &self.inner.canvas;

        let mut state = self.inner.state.lock();
        if let Some(active) = &state.active {
            active.orchestrator.set_source(Some(source));
            active.orchestrator.request_update();
            state.selection.provider = Some(name.clone());
            info!(provider = %name, "Basemap provider switched");
            return Ok(());
        }

        let was_empty = canvas.layer_count() == 0;
        switch_to_tiling_space(canvas.as_ref())?;

        let layer = Arc::new(RasterLayer::new(
            self.inner.layer_name.as_str(),
            canvas.extent(),
            canvas.crs(),
        ));
        canvas.add_layer_bottom(layer.entry());

        let placeholder = if was_empty {
            let entry = LayerEntry::new(PLACEHOLDER_LAYER_NAME, LayerKind::Vector).hidden();
            let id = entry.id;
            canvas.add_layer(entry);
            canvas.set_extent(Extent::tiling_space());
            debug!(layer = %id, "Empty map, added placeholder layer");
            Some(id)
        } else {
            None
        };

        let orchestrator = BasemapOrchestrator::new(
            Arc::clone(canvas),
            Arc::clone(&layer),
            Arc::clone(&self.inner.progress),
        )
        .with_source(source)
        .with_opacity(state.selection.opacity);

        let listener = CancellationToken::new();
        tokio::spawn(forward_events(
            Arc::downgrade(&self.inner),
            canvas.subscribe(),
            listener.clone(),
        ));

        orchestrator.request_update();
        info!(provider = %name, layer = %layer.id(), "Basemap enabled");

        state.selection.provider = Some(name);
        state.active = Some(Active {
            layer,
            orchestrator,
            placeholder,
            listener,
        });
        Ok(())
    }

    /// Removes the basemap and resets the selection to no provider.
    pub fn disable(&self) {
        let active = {
            let mut state = self.inner.state.lock();
            state.selection.provider = None;
            state.active.take()
        };
        if let Some(active) = active {
            self.teardown(active);
            info!("Basemap disabled");
        }
    }

    /// Stops the pipeline but keeps the selection, e.g. when the host
    /// unloads. The selection can still be saved afterwards.
    pub fn shutdown(&self) {
        let active = self.inner.state.lock().active.take();
        if let Some(active) = active {
            self.teardown(active);
            info!("Basemap shut down");
        }
    }

    /// Called when the raster layer may have been deleted by the user. If it
    /// is no longer in the layer tree, the basemap resets to no provider.
    pub fn on_layer_externally_removed(&self) {
        let active = {
            let mut state = self.inner.state.lock();
            match &state.active {
                Some(active) if !self.inner.canvas.contains_layer(active.layer.id()) => {
                    state.selection.provider = None;
                    state.active.take()
                }
                _ => None,
            }
        };
        if let Some(active) = active {
            self.teardown(active);
            info!("Basemap layer removed by user, basemap reset");
        }
    }

    /// Sets the opacity (clamped to 100) and redraws.
    pub fn set_opacity(&self, opacity: u8) {
        let opacity = opacity.min(100);
        let mut state = self.inner.state.lock();
        state.selection.opacity = opacity;
        if let Some(active) = &state.active {
            active.orchestrator.set_opacity(opacity);
            active.orchestrator.request_update();
        }
    }

    /// Schedules a redraw for the current viewport.
    pub fn request_update(&self) {
        if let Some(active) = &self.inner.state.lock().active {
            active.orchestrator.request_update();
        }
    }

    /// Waits for the current job and any pending restart.
    pub async fn wait_idle(&self) {
        let orchestrator = self.orchestrator();
        if let Some(orchestrator) = orchestrator {
            orchestrator.wait_idle().await;
        }
    }

    /// Persists the provider selection and opacity.
    pub fn save_settings(&self, settings: &dyn ProjectSettings) -> Result<(), BasemapError> {
        self.selection()
            .save(settings, &self.inner.settings_prefix)?;
        Ok(())
    }

    /// Restores the selection from `settings`, enabling or disabling the
    /// basemap to match.
    pub fn load_settings(&self, settings: &dyn ProjectSettings) -> Result<(), BasemapError> {
        let selection = BasemapSelection::load(settings, &self.inner.settings_prefix)?;
        debug!(
            provider = selection.provider_setting(),
            opacity = selection.opacity,
            "Loaded basemap selection"
        );
        self.set_opacity(selection.opacity);
        match selection.provider {
            Some(provider) => self.enable(&provider),
            None => {
                self.disable();
                Ok(())
            }
        }
    }

    fn teardown(&self, active: Active) {
        let canvas = &self.inner.canvas;
        active.listener.cancel();
        active.orchestrator.shutdown();
        canvas.remove_layer(active.layer.id());
        if let Some(id) = active.placeholder {
            canvas.remove_layer(id);
        }
        self.inner.progress.reset();
        canvas.invalidate();
    }

    fn handle_layer_removed(&self, id: LayerId) {
        let (raster, placeholder) = {
            let state = self.inner.state.lock();
            match &state.active {
                Some(active) => (Some(active.layer.id()), active.placeholder),
                None => (None, None),
            }
        };

        if raster == Some(id) {
            self.on_layer_externally_removed();
        } else if placeholder == Some(id) {
            if let Some(active) = self.inner.state.lock().active.as_mut() {
                active.placeholder = None;
            }
            debug!(layer = %id, "Placeholder layer removed by user");
        }
    }
}

/// Reprojects the view into Web Mercator when the canvas uses another
/// system.
fn switch_to_tiling_space(canvas: &dyn MapCanvas) -> Result<(), ReprojectionError> {
    let crs = canvas.crs();
    if crs.is_tiling_space() {
        return Ok(());
    }

    let extent = clamp_to_crs(&canvas.extent(), &crs);
    let corners = reproject(&extent.corners(), None, &crs, &Crs::WebMercator)?;
    let target = Extent::from_points(&corners)
        .map(|e| e.clamp_to_tiling_space())
        .unwrap_or_else(Extent::tiling_space);

    canvas.set_crs(Crs::WebMercator);
    canvas.set_extent(target);
    info!(from = %crs, extent = %target, "Canvas switched to Web Mercator");
    Ok(())
}

/// Forwards canvas events to the manager until cancelled or the manager is
/// dropped.
async fn forward_events(
    weak: Weak<Inner>,
    mut events: broadcast::Receiver<CanvasEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let manager = BasemapManager { inner };

        match event {
            Ok(CanvasEvent::ViewportChanged { .. }) => manager.request_update(),
            Ok(CanvasEvent::LayerRemoved { id }) => manager.handle_layer_removed(id),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Canvas events lagged, refreshing");
                manager.request_update();
            }
            Err(RecvError::Closed) => break,
        }
    }
    trace!("Canvas event listener stopped");
}
