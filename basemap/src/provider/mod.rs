//! Tile source abstraction
//!
//! [`TileSource`] is the seam between the fetch-stitch pipeline and whatever
//! supplies raster tiles. [`XyzTileSource`] implements it for any XYZ tile
//! server in the [`ProviderConfig`] catalog, downloading through an
//! [`AsyncHttpClient`] and caching encoded tiles in a [`TileCache`].
//!
//! ```ignore
//! use basemap::provider::{AsyncReqwestClient, ProviderConfig, XyzTileSource};
//!
//! let client = AsyncReqwestClient::new()?;
//! let source = XyzTileSource::new(ProviderConfig::OpenStreetMap, client);
//! let tiles = source.get_tiles(envelope, pixels, &cancel).await?;
//! ```

mod cache;
mod catalog;
mod factory;
mod http;
mod solid;
mod types;
mod xyz;

pub use cache::{TileCache, TileCacheStats, DEFAULT_TILE_CACHE_BYTES};
pub use catalog::{ProviderConfig, NO_PROVIDER};
pub use factory::{SourceFactory, XyzSourceFactory};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use solid::{SolidColorSource, StaticSourceFactory};
pub use types::{FetchError, ProviderError, Tile, TileSet, TileSource};
pub use xyz::{
    decode_tile, XyzTileSource, DEFAULT_MAX_CONCURRENT_DOWNLOADS, DEFAULT_MAX_TILES_PER_REQUEST,
};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
