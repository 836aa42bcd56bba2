//! Spatial background averaging.
//!
//! Computes a smoothed "background" field by averaging each gate with its
//! neighbors inside a physical radius. The per-axis window comes from the
//! field's [`Geometry`]; for polar sweeps the azimuthal extent narrows with
//! range so the window covers roughly the same physical area everywhere.

use rayon::prelude::*;

use crate::core::field::MomentField;
use crate::core::geometry::{Geometry, GeometryError};

use super::{resolve_row, row_offset_bounds};

/// Compute the background average of a moment field.
///
/// Each output gate is the mean of all valid (finite) values inside the
/// window, the gate itself included. Missing gates stay missing in the
/// output, and gates whose whole window is missing become missing rather
/// than zero. Edge gates use the smaller clipped neighborhood; cyclic
/// polar azimuth wraps instead of clipping.
///
/// # Arguments
///
/// * `field` - Input moment field
/// * `radius_m` - Physical averaging radius in meters
///
/// # Errors
///
/// Returns [`GeometryError`] before any gate is processed if the radius is
/// negative or non-finite, or the field's spacing is invalid.
pub fn background_average(field: &MomentField, radius_m: f32) -> Result<MomentField, GeometryError> {
    let geometry = field.geometry();
    geometry.validate()?;
    Geometry::validate_radius(radius_m)?;

    let shape = field.shape();
    let n_rows = shape.rows;
    let n_cols = shape.cols;
    let cyclic = geometry.is_cyclic();

    // Each row is independent: parallelize across rows and flatten.
    let rows: Vec<Vec<f32>> = (0..n_rows)
        .into_par_iter()
        .map(|row| {
            let mut out_row = Vec::with_capacity(n_cols);

            for col in 0..n_cols {
                if !field.is_valid(row, col) {
                    out_row.push(f32::NAN);
                    continue;
                }

                let win = geometry.window(radius_m, col);
                let (d_lo, d_hi) = row_offset_bounds(win.rows, n_rows, cyclic);
                let c_lo = col.saturating_sub(win.cols);
                let c_hi = col.saturating_add(win.cols).min(n_cols - 1);

                let mut sum = 0.0f64;
                let mut count = 0usize;

                for d_row in d_lo..=d_hi {
                    let rr = match resolve_row(row, d_row, n_rows, cyclic) {
                        Some(rr) => rr,
                        None => continue,
                    };
                    for cc in c_lo..=c_hi {
                        let v = field.get(rr, cc);
                        if v.is_finite() {
                            sum += v as f64;
                            count += 1;
                        }
                    }
                }

                out_row.push(if count > 0 {
                    (sum / count as f64) as f32
                } else {
                    f32::NAN
                });
            }

            out_row
        })
        .collect();

    let mut data = Vec::with_capacity(shape.len());
    for row in rows {
        data.extend(row);
    }

    Ok(MomentField::from_raw(data, shape, geometry))
}
