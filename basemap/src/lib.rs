//! Basemap - web map tiles as a background layer
//!
//! This library keeps a raster basemap in step with a map canvas. Whenever
//! the view changes, a background job reprojects the viewport into the Web
//! Mercator tiling space, picks a zoom level, downloads the covering XYZ
//! tiles, stitches them into one image and installs it on the canvas.
//!
//! # Modules
//!
//! - [`reproject`]: coordinate transforms between reference systems
//! - [`grid`]: zoom selection and tile footprints
//! - [`provider`]: tile sources, the provider catalog and the tile cache
//! - [`stitch`]: mosaicking tiles with opacity
//! - [`orchestrator`]: the cancel-and-restart background worker
//! - [`layer`]: the raster layer and its enable/disable lifecycle
//! - [`canvas`]: the host map interface and an in-memory implementation
//! - [`plugin`]: host lifecycle hooks

pub mod canvas;
pub mod config;
pub mod coord;
pub mod grid;
pub mod layer;
pub mod logging;
pub mod orchestrator;
pub mod plugin;
pub mod progress;
pub mod provider;
pub mod reproject;
pub mod settings;
pub mod stitch;
