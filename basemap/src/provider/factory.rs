//! Builds tile sources by provider name.

use std::sync::Arc;

use tracing::debug;

use crate::config::BasemapConfig;

use super::cache::TileCache;
use super::catalog::ProviderConfig;
use super::http::{AsyncHttpClient, AsyncReqwestClient};
use super::types::{FetchError, ProviderError, TileSource};
use super::xyz::XyzTileSource;

/// Resolves a provider name to a ready tile source.
pub trait SourceFactory: Send + Sync {
    /// Names the factory can build, in display order.
    fn available(&self) -> Vec<String>;

    fn create(&self, name: &str) -> Result<Arc<dyn TileSource>, FetchError>;
}

/// Factory for [`XyzTileSource`]s sharing one HTTP client and one tile
/// cache.
pub struct XyzSourceFactory<C: AsyncHttpClient + Clone + 'static = AsyncReqwestClient> {
    client: C,
    cache: TileCache,
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,
    max_concurrent: usize,
    max_tiles: usize,
    custom: Vec<ProviderConfig>,
}

impl XyzSourceFactory<AsyncReqwestClient> {
    /// Builds the reqwest client and cache from configuration.
    pub fn from_config(config: &BasemapConfig) -> Result<Self, ProviderError> {
        let client = AsyncReqwestClient::with_options(config.http_timeout, &config.user_agent)?;
        Ok(Self::new(client)
            .with_cache(TileCache::new(config.tile_cache_bytes))
            .with_tile_size(config.tile_size)
            .with_zoom_range(config.min_zoom, config.max_zoom)
            .with_max_concurrent_downloads(config.max_concurrent_downloads)
            .with_max_tiles(config.max_tiles_per_request))
    }
}

impl<C: AsyncHttpClient + Clone + 'static> XyzSourceFactory<C> {
    pub fn new(client: C) -> Self {
        let defaults = BasemapConfig::default();
        Self {
            client,
            cache: TileCache::default(),
            tile_size: defaults.tile_size,
            min_zoom: defaults.min_zoom,
            max_zoom: defaults.max_zoom,
            max_concurrent: defaults.max_concurrent_downloads,
            max_tiles: defaults.max_tiles_per_request,
            custom: Vec::new(),
        }
    }

    pub fn with_cache(mut self, cache: TileCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_max_tiles(mut self, max: usize) -> Self {
        self.max_tiles = max;
        self
    }

    /// Registers a provider outside the built-in catalog. Custom providers
    /// are looked up by exact (case-insensitive) name before the catalog.
    pub fn with_custom_provider(mut self, provider: ProviderConfig) -> Self {
        self.custom.push(provider);
        self
    }

    /// Cache shared by every source this factory builds.
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    fn resolve(&self, name: &str) -> Option<ProviderConfig> {
        self.custom
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
            .or_else(|| ProviderConfig::from_name(name))
    }
}

impl<C: AsyncHttpClient + Clone + 'static> SourceFactory for XyzSourceFactory<C> {
    fn available(&self) -> Vec<String> {
        ProviderConfig::builtin()
            .iter()
            .chain(self.custom.iter())
            .map(|p| p.name().to_string())
            .collect()
    }

    fn create(&self, name: &str) -> Result<Arc<dyn TileSource>, FetchError> {
        let provider = self
            .resolve(name)
            .ok_or_else(|| FetchError::UnknownProvider(name.to_string()))?;
        debug!(provider = provider.id(), "Creating tile source");

        let source = XyzTileSource::new(provider, self.client.clone())
            .with_cache(self.cache.clone())
            .with_tile_size(self.tile_size)
            .with_zoom_range(self.min_zoom, self.max_zoom)
            .with_max_concurrent_downloads(self.max_concurrent)
            .with_max_tiles(self.max_tiles);
        Ok(Arc::new(source))
    }
}
