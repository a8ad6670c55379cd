//! Host integration
//!
//! A host loads the basemap as a [`Plugin`]. [`BasemapPlugin`] wires a
//! [`BasemapManager`] to the host's canvas, project settings and progress
//! display, restores the saved selection on start and persists it on stop.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::canvas::MapCanvas;
use crate::config::BasemapConfig;
use crate::layer::{basemap_name_key, BasemapError, BasemapManager};
use crate::progress::ProgressSink;
use crate::provider::SourceFactory;
use crate::settings::{ProjectSettings, SettingsError};

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Basemap(#[from] BasemapError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Plugin is not started")]
    NotStarted,
}

/// Lifecycle hooks a host calls on a plugin.
pub trait Plugin {
    fn name(&self) -> &str;

    fn start(&mut self) -> Result<(), PluginError>;

    fn stop(&mut self) -> Result<(), PluginError>;

    fn is_started(&self) -> bool;
}

/// Services the host hands to a plugin.
#[derive(Clone)]
pub struct PluginContext {
    pub canvas: Arc<dyn MapCanvas>,
    pub settings: Arc<dyn ProjectSettings>,
    pub progress: Arc<dyn ProgressSink>,
    pub factory: Arc<dyn SourceFactory>,
    pub config: BasemapConfig,
}

/// The basemap plugin.
pub struct BasemapPlugin {
    context: PluginContext,
    manager: BasemapManager,
    started: bool,
}

impl BasemapPlugin {
    pub fn new(context: PluginContext) -> Self {
        let manager = BasemapManager::builder(
            Arc::clone(&context.canvas),
            Arc::clone(&context.factory),
            Arc::clone(&context.progress),
        )
        .with_settings_prefix(context.config.settings_prefix.as_str())
        .build();

        Self {
            context,
            manager,
            started: false,
        }
    }

    pub fn manager(&self) -> &BasemapManager {
        &self.manager
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Applies the selection stored in the project. A project that never
    /// stored one gets the configured default provider and opacity.
    pub fn project_loaded(&self) -> Result<(), PluginError> {
        let prefix = &self.context.config.settings_prefix;
        let settings = self.context.settings.as_ref();

        if settings.read(&basemap_name_key(prefix))?.is_some() {
            self.manager.load_settings(settings)?;
            return Ok(());
        }

        debug!("Project has no basemap selection, applying defaults");
        self.manager.set_opacity(self.context.config.opacity);
        match &self.context.config.provider {
            Some(provider) => self.manager.set_provider(provider)?,
            None => self.manager.disable(),
        }
        Ok(())
    }

    /// Writes the current selection to the project.
    pub fn project_saving(&self) -> Result<(), PluginError> {
        if !self.started {
            return Err(PluginError::NotStarted);
        }
        self.manager
            .save_settings(self.context.settings.as_ref())?;
        Ok(())
    }

    pub fn set_provider(&self, provider: &str) -> Result<(), PluginError> {
        self.manager.set_provider(provider)?;
        Ok(())
    }

    pub fn set_opacity(&self, opacity: u8) {
        self.manager.set_opacity(opacity);
    }
}

impl Plugin for BasemapPlugin {
    fn name(&self) -> &str {
        "basemap"
    }

    fn start(&mut self) -> Result<(), PluginError> {
        if self.started {
            return Ok(());
        }
        self.project_loaded()?;
        self.started = true;
        info!(
            providers = self.manager.available_providers().len(),
            "Basemap plugin started"
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PluginError> {
        if !self.started {
            return Ok(());
        }
        let saved = self.project_saving();
        self.manager.shutdown();
        self.started = false;
        info!("Basemap plugin stopped");
        saved
    }

    fn is_started(&self) -> bool {
        self.started
    }
}
