//! Core data types: moment fields, geometry, and classification labels.

pub mod field;
pub mod geometry;
pub mod labels;

pub use self::field::{FieldError, GridShape, MomentField};
pub use self::geometry::{Geometry, GeometryError, Window};
pub use self::labels::{
    EchoClass, EchoClassification, FeatureMap, FreqBand, HydroClass, HydroClassification,
};
