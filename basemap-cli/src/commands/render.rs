//! `basemap render` - draw a basemap composite to a PNG file.
//!
//! Sets up an in-memory canvas for the requested view, starts the basemap
//! plugin on it and waits for the background job to install a composite.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use basemap::canvas::{LayerEntry, LayerKind, MapCanvas, MemoryCanvas};
use basemap::config::ConfigFile;
use basemap::coord::{Extent, PixelRect};
use basemap::orchestrator::JobOutcome;
use basemap::plugin::{BasemapPlugin, Plugin, PluginContext};
use basemap::provider::XyzSourceFactory;
use basemap::reproject::Crs;
use basemap::settings::{IniProjectSettings, MemorySettings, ProjectSettings};
use clap::Args;
use image::ImageFormat;
use console::style;
use tracing::{debug, info};

use crate::error::CliError;
use crate::progress::BarProgress;

/// Arguments for `render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// View extent as min_x,min_y,max_x,max_y in --crs units.
    /// Omit to render the whole world.
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: Option<Extent>,

    /// Coordinate system of --extent (EPSG:3857, EPSG:4326 or a +proj string)
    #[arg(long, default_value = "EPSG:3857")]
    pub crs: String,

    /// Canvas size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_pixels, default_value = "1024x768")]
    pub size: PixelRect,

    /// Provider name (see `basemap providers`); defaults to the configured one
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Opacity 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub opacity: Option<u8>,

    /// Margin in pixels rendered around the visible area
    #[arg(long, default_value_t = 0)]
    pub edge_buffer: u32,

    /// Project file to restore and save the basemap selection
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Output PNG path
    #[arg(short, long, default_value = "basemap.png")]
    pub output: PathBuf,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parses `min_x,min_y,max_x,max_y`.
pub fn parse_extent(value: &str) -> Result<Extent, String> {
    let numbers = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match numbers.as_slice() {
        [x1, y1, x2, y2] => {
            let extent = Extent::new(*x1, *y1, *x2, *y2);
            if extent.is_degenerate() {
                Err("extent has no area".to_string())
            } else {
                Ok(extent)
            }
        }
        _ => Err(format!("expected 4 comma-separated numbers, got {}", numbers.len())),
    }
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_pixels(value: &str) -> Result<PixelRect, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height))?;
    if width == 0 || height == 0 {
        return Err("size must be positive".to_string());
    }
    Ok(PixelRect::new(width, height))
}

/// Run the render command.
pub fn run(args: RenderArgs, config: ConfigFile) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Basemap(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(render(args, config))
}

async fn render(args: RenderArgs, config: ConfigFile) -> Result<(), CliError> {
    let mut config = config.config;
    if let Some(provider) = &args.provider {
        config.provider = Some(provider.clone());
    }
    if let Some(opacity) = args.opacity {
        config.opacity = opacity;
    }

    let crs: Crs = args
        .crs
        .parse()
        .map_err(|e| CliError::InvalidArgument(format!("--crs: {}", e)))?;

    let canvas = Arc::new(
        MemoryCanvas::new(
            crs.clone(),
            args.extent.unwrap_or_else(Extent::tiling_space),
            args.size,
        )
        .with_edge_buffer(args.edge_buffer),
    );
    if args.extent.is_some() {
        // Keep the requested view: the basemap only zooms out on an empty map
        canvas.add_layer(LayerEntry::new("view", LayerKind::Vector).hidden());
    }

    let settings: Arc<dyn ProjectSettings> = match &args.project {
        Some(path) => Arc::new(IniProjectSettings::new(path)),
        None => Arc::new(MemorySettings::new()),
    };
    let progress = Arc::new(if args.quiet {
        BarProgress::hidden()
    } else {
        BarProgress::new()
    });
    let factory = Arc::new(XyzSourceFactory::from_config(&config)?);

    let context = PluginContext {
        canvas: canvas.clone(),
        settings,
        progress: progress.clone(),
        factory,
        config: config.clone(),
    };
    let mut plugin = BasemapPlugin::new(context);
    plugin.start()?;

    // Command-line choices override a saved project selection
    if args.project.is_some() {
        if let Some(provider) = &args.provider {
            plugin.set_provider(provider)?;
        }
        if let Some(opacity) = args.opacity {
            plugin.set_opacity(opacity);
        }
    }

    let manager = plugin.manager().clone();
    let Some(orchestrator) = manager.orchestrator() else {
        plugin.stop()?;
        progress.finish();
        return Err(CliError::InvalidArgument(
            "no provider selected; pass --provider or set one in the config".to_string(),
        ));
    };

    // Give the event listener a moment to pick up any viewport change
    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.wait_idle().await;
    progress.finish();

    let outcome = orchestrator.last_outcome();
    let layer = orchestrator.layer().clone();
    plugin.stop()?;

    match outcome {
        Some(JobOutcome::Completed(summary)) => {
            let composite = layer.composite();
            debug!(extent = %composite.extent, "Saving composite");
            composite
                .image
                .save_with_format(&args.output, ImageFormat::Png)
                .map_err(|e| CliError::Output {
                    path: args.output.clone(),
                    message: e.to_string(),
                })?;

            info!(output = %args.output.display(), "Composite written");
            println!(
                "{} {} ({}x{}, zoom {}, {} tiles{})",
                style("✓").green().bold(),
                args.output.display(),
                summary.width,
                summary.height,
                summary.zoom,
                summary.tiles,
                if summary.failed_tiles > 0 {
                    format!(", {} failed", summary.failed_tiles)
                } else {
                    String::new()
                }
            );
            println!("  Extent: {} ({})", summary.extent, canvas.crs());
            Ok(())
        }
        Some(JobOutcome::Failed(e)) => Err(CliError::Render(e.to_string())),
        Some(JobOutcome::Cancelled) | None => {
            Err(CliError::Render("job did not complete".to_string()))
        }
    }
}
