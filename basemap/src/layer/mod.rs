//! The basemap raster layer and its lifecycle.

mod manager;
mod raster;
mod selection;

pub use manager::{
    BasemapError, BasemapManager, BasemapManagerBuilder, DEFAULT_LAYER_NAME, PLACEHOLDER_LAYER_NAME,
};
pub use raster::{CompositeImage, RasterLayer};
pub use selection::{basemap_name_key, opacity_key, BasemapSelection};
