//! Grid geometry and physical-radius window conversion.
//!
//! Both the background averager and the feature detector need to turn a
//! physical radius (meters) into a per-axis gate-count window. For polar
//! sweeps the azimuthal gate count depends on range: the arc subtended by
//! one azimuth step grows with distance from the radar, so the number of
//! rays covering a fixed physical distance shrinks as 1/range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from invalid geometry descriptors or radii.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("Invalid {axis} spacing: {step} (must be positive and finite)")]
    InvalidSpacing { axis: &'static str, step: f32 },

    #[error("Invalid range start: {start} (must be non-negative and finite)")]
    InvalidRangeStart { start: f32 },

    #[error("Invalid radius: {radius} (must be non-negative and finite)")]
    InvalidRadius { radius: f32 },
}

/// Per-axis half-window in gate counts.
///
/// `rows` spans azimuth rays (polar) or the y axis (Cartesian); `cols`
/// spans range gates or the x axis. A half-window of `h` covers gate
/// offsets `-h..=h` along that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Half-window along the row axis (azimuth / y).
    pub rows: usize,
    /// Half-window along the column axis (range / x).
    pub cols: usize,
}

/// Spatial geometry of a moment field.
///
/// Describes step sizes along both grid axes so a physical radius can be
/// converted to gate counts at any position. Row-major convention: rows are
/// azimuth rays (polar) or y (Cartesian), columns are range gates or x.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    /// Regular Cartesian grid with fixed x/y spacing in meters.
    Cartesian {
        /// Grid spacing along x (columns) in meters.
        x_step_m: f32,
        /// Grid spacing along y (rows) in meters.
        y_step_m: f32,
    },
    /// Polar sweep with fixed range-gate spacing and azimuth step.
    Polar {
        /// Range-gate spacing in meters.
        range_step_m: f32,
        /// Range of the first gate in meters.
        range_start_m: f32,
        /// Azimuth step between consecutive rays in degrees.
        azimuth_step_deg: f32,
        /// Whether azimuth wraps around 360 degrees.
        cyclic: bool,
    },
}

impl Geometry {
    /// Validate step sizes.
    ///
    /// Called eagerly by every classifier entry point so hot loops can
    /// assume well-formed spacing.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match *self {
            Geometry::Cartesian { x_step_m, y_step_m } => {
                if !(x_step_m.is_finite() && x_step_m > 0.0) {
                    return Err(GeometryError::InvalidSpacing {
                        axis: "x",
                        step: x_step_m,
                    });
                }
                if !(y_step_m.is_finite() && y_step_m > 0.0) {
                    return Err(GeometryError::InvalidSpacing {
                        axis: "y",
                        step: y_step_m,
                    });
                }
            }
            Geometry::Polar {
                range_step_m,
                range_start_m,
                azimuth_step_deg,
                ..
            } => {
                if !(range_step_m.is_finite() && range_step_m > 0.0) {
                    return Err(GeometryError::InvalidSpacing {
                        axis: "range",
                        step: range_step_m,
                    });
                }
                if !(azimuth_step_deg.is_finite() && azimuth_step_deg > 0.0) {
                    return Err(GeometryError::InvalidSpacing {
                        axis: "azimuth",
                        step: azimuth_step_deg,
                    });
                }
                if !(range_start_m.is_finite() && range_start_m >= 0.0) {
                    return Err(GeometryError::InvalidRangeStart {
                        start: range_start_m,
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate a physical radius for window conversion.
    pub fn validate_radius(radius_m: f32) -> Result<(), GeometryError> {
        if !(radius_m.is_finite() && radius_m >= 0.0) {
            return Err(GeometryError::InvalidRadius { radius: radius_m });
        }
        Ok(())
    }

    /// Whether the row axis wraps (360-degree polar azimuth).
    #[inline]
    pub fn is_cyclic(&self) -> bool {
        matches!(*self, Geometry::Polar { cyclic: true, .. })
    }

    /// Range of the gate at `col` in meters (polar), or x distance (Cartesian).
    #[inline]
    pub fn range_at(&self, col: usize) -> f32 {
        match *self {
            Geometry::Cartesian { x_step_m, .. } => col as f32 * x_step_m,
            Geometry::Polar {
                range_step_m,
                range_start_m,
                ..
            } => range_start_m + col as f32 * range_step_m,
        }
    }

    /// Convert a physical radius at a gate position into a per-axis
    /// half-window.
    ///
    /// For polar geometry the azimuthal half-window at a given range is
    /// `floor(radius / (range * azimuth_step))`, with a minimum of 1 so
    /// adjacent rays always participate; near the radar (range -> 0) the
    /// count saturates and callers clamp it against the grid extent.
    ///
    /// Spacing and radius must have been validated via [`Self::validate`]
    /// and [`Self::validate_radius`].
    pub fn window(&self, radius_m: f32, col: usize) -> Window {
        match *self {
            Geometry::Cartesian { x_step_m, y_step_m } => Window {
                rows: (radius_m / y_step_m).floor() as usize,
                cols: (radius_m / x_step_m).floor() as usize,
            },
            Geometry::Polar {
                range_step_m,
                azimuth_step_deg,
                ..
            } => {
                let cols = (radius_m / range_step_m).floor() as usize;
                let arc_m = self.range_at(col) * azimuth_step_deg.to_radians();
                // Saturating f32 -> usize cast handles range 0 (arc 0).
                let rows = ((radius_m / arc_m).floor() as usize).max(1);
                Window { rows, cols }
            }
        }
    }

}
