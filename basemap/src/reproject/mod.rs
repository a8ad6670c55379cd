//! Coordinate reprojection between reference systems.
//!
//! The basemap pipeline reprojects viewport corners from the canvas projection
//! into geographic coordinates (to query tiles) and the covered tile bounds
//! back into the canvas projection (to place the composite).
//!
//! Web Mercator ↔ geographic is computed in closed form. Every other pair is
//! handed to `proj4rs`, a pure Rust port of proj4js, so no system PROJ
//! installation is required.
//!
//! # Example
//!
//! ```
//! use basemap::reproject::{reproject, Crs};
//!
//! let lonlat = [(13.4050, 52.5200)];
//! let merc = reproject(&lonlat, None, &Crs::Geographic, &Crs::WebMercator).unwrap();
//! let back = reproject(&merc, None, &Crs::WebMercator, &Crs::Geographic).unwrap();
//! assert!((back[0].0 - 13.4050).abs() < 1e-9);
//! ```

mod crs;

pub use crs::{Crs, GEOGRAPHIC_PROJ, WEB_MERCATOR_PROJ};

use std::f64::consts::PI;

use proj4rs::proj::Proj;
use thiserror::Error;

use crate::coord::{clip, MAX_LAT, MIN_LAT, WEB_MERCATOR_MAX};

/// Errors that can occur while reprojecting coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReprojectionError {
    /// The CRS identifier is not one this crate knows.
    #[error("Unknown coordinate reference system: {0}")]
    UnknownCrs(String),

    /// The proj-string could not be parsed into a projection.
    #[error("Invalid CRS definition '{definition}': {reason}")]
    InvalidDefinition { definition: String, reason: String },

    /// Z values were supplied but not one per point.
    #[error("Expected {points} z values, got {z}")]
    ZLengthMismatch { points: usize, z: usize },

    /// An input coordinate is NaN or infinite.
    #[error("Point {index} is not finite: ({x}, {y})")]
    NonFinitePoint { index: usize, x: f64, y: f64 },

    /// The projection library rejected a point.
    #[error("Transform failed for point {index}: {reason}")]
    TransformFailed { index: usize, reason: String },
}

/// Reprojects a batch of points from `source` to `target`.
///
/// Returns a new vector with the same length and order as `points`. `z`, when
/// given, must hold one height per point; heights only matter for datum
/// shifts and are not returned.
///
/// This function holds no state and is safe to call concurrently.
pub fn reproject(
    points: &[(f64, f64)],
    z: Option<&[f64]>,
    source: &Crs,
    target: &Crs,
) -> Result<Vec<(f64, f64)>, ReprojectionError> {
    Transformer::new(source, target)?.transform_batch(points, z)
}

/// Reprojects a single point.
pub fn reproject_point(
    point: (f64, f64),
    source: &Crs,
    target: &Crs,
) -> Result<(f64, f64), ReprojectionError> {
    let out = reproject(&[point], None, source, target)?;
    Ok(out[0])
}

/// Transformation strategy - closed-form Mercator math or proj4rs for anything else.
enum Strategy {
    Identity,
    MercatorToGeographic,
    GeographicToMercator,
    Proj4rs {
        source: Box<Proj>,
        target: Box<Proj>,
        source_geographic: bool,
        target_geographic: bool,
    },
}

/// A resolved source → target transform that can be applied repeatedly.
pub struct Transformer {
    source: Crs,
    target: Crs,
    strategy: Strategy,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    /// Resolves the transform between two systems.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectionError::InvalidDefinition`] if either side is a
    /// proj-string `proj4rs` cannot parse.
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, ReprojectionError> {
        let strategy = match (source, target) {
            (s, t) if s == t => Strategy::Identity,
            (Crs::WebMercator, Crs::Geographic) => Strategy::MercatorToGeographic,
            (Crs::Geographic, Crs::WebMercator) => Strategy::GeographicToMercator,
            (s, t) => Strategy::Proj4rs {
                source: Box::new(parse_proj(s)?),
                target: Box::new(parse_proj(t)?),
                source_geographic: s.is_geographic(),
                target_geographic: t.is_geographic(),
            },
        };

        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            strategy,
        })
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Transforms one point. `index` is only used for error reporting.
    fn transform_one(
        &self,
        index: usize,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(f64, f64), ReprojectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ReprojectionError::NonFinitePoint { index, x, y });
        }

        match &self.strategy {
            Strategy::Identity => Ok((x, y)),
            Strategy::MercatorToGeographic => Ok(mercator_to_geographic(x, y)),
            Strategy::GeographicToMercator => Ok(geographic_to_mercator(x, y)),
            Strategy::Proj4rs {
                source,
                target,
                source_geographic,
                target_geographic,
            } => {
                let mut point = if *source_geographic {
                    (x.to_radians(), y.to_radians(), z)
                } else {
                    (x, y, z)
                };

                proj4rs::transform::transform(source, target, &mut point).map_err(|e| {
                    ReprojectionError::TransformFailed {
                        index,
                        reason: format!("{e:?}"),
                    }
                })?;

                let out = if *target_geographic {
                    (point.0.to_degrees(), point.1.to_degrees())
                } else {
                    (point.0, point.1)
                };
                if !out.0.is_finite() || !out.1.is_finite() {
                    return Err(ReprojectionError::TransformFailed {
                        index,
                        reason: "result is not finite".to_string(),
                    });
                }
                Ok(out)
            }
        }
    }

    /// Transforms a batch of points, preserving count and order.
    pub fn transform_batch(
        &self,
        points: &[(f64, f64)],
        z: Option<&[f64]>,
    ) -> Result<Vec<(f64, f64)>, ReprojectionError> {
        if let Some(z) = z {
            if z.len() != points.len() {
                return Err(ReprojectionError::ZLengthMismatch {
                    points: points.len(),
                    z: z.len(),
                });
            }
        }

        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let height = z.map_or(0.0, |z| z[i]);
                self.transform_one(i, x, y, height)
            })
            .collect()
    }
}

fn parse_proj(crs: &Crs) -> Result<Proj, ReprojectionError> {
    let definition = crs.proj_string();
    Proj::from_proj_string(definition).map_err(|e| ReprojectionError::InvalidDefinition {
        definition: definition.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Web Mercator metres → longitude/latitude degrees.
#[inline]
fn mercator_to_geographic(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / WEB_MERCATOR_MAX;
    let y_rad = y * PI / WEB_MERCATOR_MAX;
    let lat = (2.0 * y_rad.exp().atan() - PI / 2.0) * 180.0 / PI;
    (lon, lat)
}

/// Longitude/latitude degrees → Web Mercator metres.
///
/// Latitude is clipped to the Mercator range so the poles stay finite.
#[inline]
fn geographic_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = clip(lat, MIN_LAT, MAX_LAT);
    let x = lon * WEB_MERCATOR_MAX / 180.0;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * WEB_MERCATOR_MAX / PI;
    (x, y)
}
