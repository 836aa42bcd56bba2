//! Peakedness-based convective/stratiform partitioning.
//!
//! A gate is convective when its value stands far enough above the local
//! background; the required excess is a configurable function of the
//! background itself, so different published separation criteria are just
//! different [`ThresholdCurve`] configurations.

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ConvStratConfig, ThresholdCurve};
use crate::core::field::MomentField;
use crate::core::geometry::GeometryError;
use crate::core::labels::{EchoClass, EchoClassification};

use super::background::background_average;

/// Errors from the convective/stratiform path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PeakednessError {
    #[error("Field shape {field_rows}x{field_cols} does not match background shape {bg_rows}x{bg_cols}")]
    ShapeMismatch {
        field_rows: usize,
        field_cols: usize,
        bg_rows: usize,
        bg_cols: usize,
    },

    #[error("Field and background geometry disagree")]
    GeometryMismatch,

    #[error("Invalid threshold curve: {reason}")]
    InvalidThreshold { reason: &'static str },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

fn validate_curve(curve: &ThresholdCurve) -> Result<(), PeakednessError> {
    let reason = match *curve {
        ThresholdCurve::Constant { excess_db } => {
            (!excess_db.is_finite()).then_some("excess must be finite")
        }
        ThresholdCurve::Parabolic {
            max_excess_db,
            scale_db2,
        } => {
            if !max_excess_db.is_finite() {
                Some("max excess must be finite")
            } else {
                (!(scale_db2.is_finite() && scale_db2 > 0.0)).then_some("scale must be positive")
            }
        }
        ThresholdCurve::Cosine {
            max_excess_db,
            halfwidth_db,
        } => {
            if !max_excess_db.is_finite() {
                Some("max excess must be finite")
            } else {
                (!(halfwidth_db.is_finite() && halfwidth_db > 0.0))
                    .then_some("halfwidth must be positive")
            }
        }
    };

    match reason {
        Some(reason) => Err(PeakednessError::InvalidThreshold { reason }),
        None => Ok(()),
    }
}

/// Label each gate from its value and precomputed background.
///
/// Per-gate rules, in order (threshold ties count as met, `>=` not `>`):
/// 1. missing or below `min_detectable_dbz` -> NoEcho
/// 2. below `weak_echo_dbz` -> WeakEcho
/// 3. at or above `always_convective_dbz` (when set) -> Convective
/// 4. background missing -> Uncertain
/// 5. excess over background meets the threshold curve and the value is at
///    or above `convective_floor_dbz` -> Convective
/// 6. otherwise -> Stratiform
///
/// # Errors
///
/// Fails before any gate is processed if field and background disagree in
/// shape or geometry, or the threshold curve is malformed.
pub fn classify_peakedness(
    field: &MomentField,
    background: &MomentField,
    config: &ConvStratConfig,
) -> Result<EchoClassification, PeakednessError> {
    let shape = field.shape();
    let bg_shape = background.shape();
    if shape != bg_shape {
        return Err(PeakednessError::ShapeMismatch {
            field_rows: shape.rows,
            field_cols: shape.cols,
            bg_rows: bg_shape.rows,
            bg_cols: bg_shape.cols,
        });
    }
    if field.geometry() != background.geometry() {
        return Err(PeakednessError::GeometryMismatch);
    }
    validate_curve(&config.threshold)?;

    let values = field.data();
    let bg_values = background.data();

    let labels: Vec<EchoClass> = values
        .par_iter()
        .zip(bg_values.par_iter())
        .map(|(&value, &bg)| {
            if !value.is_finite() || value < config.min_detectable_dbz {
                return EchoClass::NoEcho;
            }
            if value < config.weak_echo_dbz {
                return EchoClass::WeakEcho;
            }
            if let Some(intense) = config.always_convective_dbz {
                if value >= intense {
                    return EchoClass::Convective;
                }
            }
            if !bg.is_finite() {
                return EchoClass::Uncertain;
            }
            if value - bg >= config.threshold.required_excess(bg)
                && value >= config.convective_floor_dbz
            {
                EchoClass::Convective
            } else {
                EchoClass::Stratiform
            }
        })
        .collect();

    Ok(EchoClassification::from_raw(labels, shape, field.geometry()))
}

/// Full convective/stratiform classification of a moment field.
///
/// Computes the background average at `config.background_radius_m`, then
/// applies [`classify_peakedness`].
pub fn classify_conv_strat(
    field: &MomentField,
    config: &ConvStratConfig,
) -> Result<EchoClassification, PeakednessError> {
    // Structural checks before the background pass touches any gate.
    validate_curve(&config.threshold)?;

    let background = background_average(field, config.background_radius_m)?;
    let labels = classify_peakedness(field, &background, config)?;

    debug!(
        "conv/strat: {} convective, {} stratiform, {} weak, {} no-echo, {} uncertain",
        labels.count_of(EchoClass::Convective),
        labels.count_of(EchoClass::Stratiform),
        labels.count_of(EchoClass::WeakEcho),
        labels.count_of(EchoClass::NoEcho),
        labels.count_of(EchoClass::Uncertain),
    );

    Ok(labels)
}
