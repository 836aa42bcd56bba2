//! Radar echo classification core.
//!
//! This crate provides tools for:
//! - Spatial background averaging of radar moment fields (polar or Cartesian)
//! - Peakedness-based convective/stratiform partitioning
//! - Connected-component detection of convective cores with optional dilation
//! - Fuzzy-logic hydrometeor classification from polarimetric moments
//!
//! All classifiers are pure transforms over immutable [`MomentField`] inputs;
//! the convective/stratiform path and the hydrometeor path share no state and
//! may run concurrently.
//!
//! # Example
//!
//! ```
//! use radar_echo_class::{classify_conv_strat, ConvStratConfig, Geometry, GridShape, MomentField};
//!
//! let shape = GridShape::new(8, 8);
//! let geometry = Geometry::Cartesian {
//!     x_step_m: 1000.0,
//!     y_step_m: 1000.0,
//! };
//! let field = MomentField::filled(20.0, shape, geometry);
//!
//! let labels = classify_conv_strat(&field, &ConvStratConfig::default()).unwrap();
//! assert_eq!(labels.shape(), shape);
//! ```

pub mod config;
pub mod core;
pub mod processors;

pub use crate::config::{
    default_class_definitions, ClassifierConfig, Connectivity, ConvStratConfig, FeatureConfig,
    FuzzyClassDefinition, HydroConfig, MembershipFunction, ThresholdCurve,
};
pub use crate::core::field::{FieldError, GridShape, MomentField};
pub use crate::core::geometry::{Geometry, GeometryError, Window};
pub use crate::core::labels::{
    EchoClass, EchoClassification, FeatureMap, FreqBand, HydroClass, HydroClassification,
};
pub use crate::processors::{
    background_average, classify_conv_strat, classify_hydro, classify_peakedness,
    detect_feature_mask, detect_features, validate_class_definitions, FeatureError, HydroError,
    PeakednessError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
