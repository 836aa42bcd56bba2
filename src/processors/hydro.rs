//! Fuzzy-logic hydrometeor classification.
//!
//! Each gate's polarimetric moments are scored against per-class
//! trapezoidal membership functions; the weighted, normalized aggregate
//! picks the winning hydrometeor class, with the margin over the runner-up
//! reported as confidence so callers can flag ambiguous boundary gates.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{FuzzyClassDefinition, HydroConfig, MembershipFunction};
use crate::core::field::MomentField;
use crate::core::labels::{HydroClass, HydroClassification};

/// Errors from the hydrometeor path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HydroError {
    #[error("No hydrometeor classes defined")]
    NoClasses,

    #[error("No moment fields supplied")]
    NoFields,

    #[error("Invalid class definition for {class:?}: {reason}")]
    InvalidClassDefinition { class: HydroClass, reason: String },

    #[error("Moment \"{name}\" shape or geometry disagrees with \"{reference}\"")]
    ShapeMismatch { name: String, reference: String },
}

/// Validate a set of class definitions.
///
/// Checks every membership function for finite, non-decreasing breakpoints
/// and a positive weight. Runs once, before any gate is scored, so a bad
/// configuration never produces partially-valid output.
pub fn validate_class_definitions(classes: &[FuzzyClassDefinition]) -> Result<(), HydroError> {
    if classes.is_empty() {
        return Err(HydroError::NoClasses);
    }

    for def in classes {
        if def.members.is_empty() {
            return Err(HydroError::InvalidClassDefinition {
                class: def.class,
                reason: "no membership functions".to_string(),
            });
        }

        for (name, mf) in &def.members {
            let bp = mf.breakpoints;
            if bp.iter().any(|v| !v.is_finite()) {
                return Err(HydroError::InvalidClassDefinition {
                    class: def.class,
                    reason: format!("non-finite breakpoints for moment \"{name}\""),
                });
            }
            if !(bp[0] <= bp[1] && bp[1] <= bp[2] && bp[2] <= bp[3]) {
                return Err(HydroError::InvalidClassDefinition {
                    class: def.class,
                    reason: format!("breakpoints must be non-decreasing for moment \"{name}\""),
                });
            }
            if !(mf.weight.is_finite() && mf.weight > 0.0) {
                return Err(HydroError::InvalidClassDefinition {
                    class: def.class,
                    reason: format!("weight must be positive for moment \"{name}\""),
                });
            }
        }
    }

    Ok(())
}

/// Flattened class definition for the per-gate loop.
struct ClassEval<'a> {
    class: HydroClass,
    nominal_weight: f32,
    members: Vec<(Option<&'a [f32]>, MembershipFunction)>,
}

/// Classify hydrometeor types from a set of moment fields.
///
/// `fields` maps moment names (e.g. "zh", "zdr", "kdp", "rhohv") to
/// same-shaped fields; class definitions reference moments by those names.
///
/// Per gate, per class: moments missing at the gate contribute no weight
/// to the normalization, and a class whose available weight falls below
/// `min_weight_fraction` of its nominal weight is excluded outright rather
/// than scored near zero. Gates where no class survives, or the winning
/// score stays below `min_confidence`, are Unclassified with confidence
/// 0.0. Exact score ties go to the class defined first.
///
/// # Errors
///
/// Fails before any gate is scored on malformed class definitions
/// ([`HydroError::InvalidClassDefinition`]), an empty field map, or
/// disagreeing field shapes/geometries.
pub fn classify_hydro(
    fields: &HashMap<String, MomentField>,
    config: &HydroConfig,
) -> Result<HydroClassification, HydroError> {
    validate_class_definitions(&config.classes)?;

    let (ref_name, ref_field) = fields
        .iter()
        .min_by(|a, b| a.0.cmp(b.0))
        .ok_or(HydroError::NoFields)?;

    for (name, field) in fields {
        if field.shape() != ref_field.shape() || field.geometry() != ref_field.geometry() {
            return Err(HydroError::ShapeMismatch {
                name: name.clone(),
                reference: ref_name.clone(),
            });
        }
    }

    let shape = ref_field.shape();

    let evals: Vec<ClassEval> = config
        .classes
        .iter()
        .map(|def| ClassEval {
            class: def.class,
            nominal_weight: def.nominal_weight(),
            members: def
                .members
                .iter()
                .map(|(name, mf)| (fields.get(name).map(|f| f.data()), *mf))
                .collect(),
        })
        .collect();

    let results: Vec<(HydroClass, f32)> = (0..shape.len())
        .into_par_iter()
        .map(|idx| {
            let mut best_class = None;
            let mut best_score = f32::NEG_INFINITY;
            let mut runner_up = f32::NEG_INFINITY;

            for eval in &evals {
                let mut available = 0.0f32;
                let mut weighted = 0.0f32;

                for (data, mf) in &eval.members {
                    if let Some(data) = data {
                        let value = data[idx];
                        if value.is_finite() {
                            available += mf.weight;
                            weighted += mf.weight * mf.evaluate(value);
                        }
                    }
                }

                if available <= 0.0 || available < config.min_weight_fraction * eval.nominal_weight
                {
                    continue;
                }

                let score = weighted / available;
                if score > best_score {
                    runner_up = best_score;
                    best_score = score;
                    best_class = Some(eval.class);
                } else if score > runner_up {
                    runner_up = score;
                }
            }

            match best_class {
                Some(class) if best_score >= config.min_confidence => {
                    let margin = if runner_up.is_finite() {
                        best_score - runner_up
                    } else {
                        // Winner was the only candidate.
                        best_score
                    };
                    (class, margin)
                }
                _ => (HydroClass::Unclassified, 0.0),
            }
        })
        .collect();

    let mut classes = Vec::with_capacity(results.len());
    let mut confidence = Vec::with_capacity(results.len());
    for (class, margin) in results {
        classes.push(class);
        confidence.push(margin);
    }

    let unclassified = classes
        .iter()
        .filter(|&&c| c == HydroClass::Unclassified)
        .count();
    debug!(
        "hydro: {} gates classified, {} unclassified",
        classes.len() - unclassified,
        unclassified
    );

    Ok(HydroClassification::new(classes, confidence, shape))
}
