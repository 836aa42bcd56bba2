//! Classification labels and result containers.
//!
//! Label sets are closed enums so downstream consumers get exhaustiveness
//! checking; a label is only meaningful together with the configuration it
//! was produced under, which is why the enums carry serde derives for
//! storage alongside that configuration.

use serde::{Deserialize, Serialize};

use super::field::{FieldError, GridShape};
use super::geometry::Geometry;

/// Precipitation-regime label for the convective/stratiform path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoClass {
    /// Gate missing or below the minimum-detectable threshold.
    NoEcho,
    /// Echo present but below the low-confidence floor.
    WeakEcho,
    /// Broad, uniform precipitation.
    Stratiform,
    /// Localized convective core.
    Convective,
    /// Background unavailable; caller chooses the fallback policy.
    Uncertain,
}

impl EchoClass {
    /// Returns true for labels that represent classified precipitation.
    #[inline]
    pub fn is_precipitation(&self) -> bool {
        matches!(self, EchoClass::Stratiform | EchoClass::Convective)
    }
}

/// Hydrometeor-type label for the fuzzy classification path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydroClass {
    LightRain,
    ModerateRain,
    HeavyRain,
    Hail,
    Graupel,
    DrySnow,
    WetSnow,
    IceCrystals,
    Mixed,
    /// No class scored above the confidence floor, or too few moments
    /// were available at the gate.
    Unclassified,
}

/// Radar frequency band, used to select membership calibrations.
///
/// Polarimetric signatures (KDP especially) scale with radar frequency, so
/// class definitions are calibrated per band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreqBand {
    S,
    C,
    X,
}

impl FreqBand {
    /// Band for a radar frequency in Hz, or `None` outside the supported
    /// 2-12.5 GHz span.
    pub fn from_frequency_hz(freq_hz: f64) -> Option<Self> {
        if (2e9..4e9).contains(&freq_hz) {
            Some(FreqBand::S)
        } else if (4e9..8e9).contains(&freq_hz) {
            Some(FreqBand::C)
        } else if (8e9..12.5e9).contains(&freq_hz) {
            Some(FreqBand::X)
        } else {
            None
        }
    }
}

/// Per-gate convective/stratiform labels with the shape and geometry they
/// were produced under.
#[derive(Debug, Clone)]
pub struct EchoClassification {
    labels: Vec<EchoClass>,
    shape: GridShape,
    geometry: Geometry,
}

impl EchoClassification {
    /// Create a classification from row-major labels.
    pub fn new(
        labels: Vec<EchoClass>,
        shape: GridShape,
        geometry: Geometry,
    ) -> Result<Self, FieldError> {
        if labels.len() != shape.len() {
            return Err(FieldError::ShapeMismatch {
                rows: shape.rows,
                cols: shape.cols,
                len: labels.len(),
            });
        }
        Ok(Self {
            labels,
            shape,
            geometry,
        })
    }

    /// Construct from parts already known to be consistent.
    pub(crate) fn from_raw(labels: Vec<EchoClass>, shape: GridShape, geometry: Geometry) -> Self {
        debug_assert_eq!(labels.len(), shape.len());
        Self {
            labels,
            shape,
            geometry,
        }
    }

    /// Label at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> EchoClass {
        self.labels[self.shape.index(row, col)]
    }

    /// Row-major label slice.
    #[inline]
    pub fn labels(&self) -> &[EchoClass] {
        &self.labels
    }

    /// Grid shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Geometry the labels were produced under.
    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Number of gates carrying the given label.
    pub fn count_of(&self, class: EchoClass) -> usize {
        self.labels.iter().filter(|&&l| l == class).count()
    }
}

/// Connected convective features as per-gate ids.
///
/// Ids are `0..count` in deterministic raster order (a feature's id is
/// the rank of its first-encountered gate in a row-major scan); `-1`
/// marks gates belonging to no feature.
#[derive(Debug, Clone)]
pub struct FeatureMap {
    ids: Vec<i32>,
    count: usize,
    shape: GridShape,
}

impl FeatureMap {
    pub(crate) fn new(ids: Vec<i32>, count: usize, shape: GridShape) -> Self {
        Self { ids, count, shape }
    }

    /// Feature id at `(row, col)`, or `-1` for no feature.
    #[inline]
    pub fn id(&self, row: usize, col: usize) -> i32 {
        self.ids[self.shape.index(row, col)]
    }

    /// Row-major feature-id slice.
    #[inline]
    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    /// Number of features.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Grid shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Gate count per feature id.
    pub fn feature_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.count];
        for &id in &self.ids {
            if id >= 0 {
                sizes[id as usize] += 1;
            }
        }
        sizes
    }
}

/// Per-gate hydrometeor labels with the winner-minus-runner-up confidence.
#[derive(Debug, Clone)]
pub struct HydroClassification {
    classes: Vec<HydroClass>,
    confidence: Vec<f32>,
    shape: GridShape,
}

impl HydroClassification {
    pub(crate) fn new(classes: Vec<HydroClass>, confidence: Vec<f32>, shape: GridShape) -> Self {
        debug_assert_eq!(classes.len(), confidence.len());
        Self {
            classes,
            confidence,
            shape,
        }
    }

    /// Class at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> HydroClass {
        self.classes[self.shape.index(row, col)]
    }

    /// Confidence margin at `(row, col)`; 0.0 for unclassified gates.
    #[inline]
    pub fn confidence(&self, row: usize, col: usize) -> f32 {
        self.confidence[self.shape.index(row, col)]
    }

    /// Row-major class slice.
    #[inline]
    pub fn classes(&self) -> &[HydroClass] {
        &self.classes
    }

    /// Row-major confidence slice.
    #[inline]
    pub fn confidences(&self) -> &[f32] {
        &self.confidence
    }

    /// Grid shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Number of gates carrying the given class.
    pub fn count_of(&self, class: HydroClass) -> usize {
        self.classes.iter().filter(|&&c| c == class).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freq_band_lookup() {
        assert_eq!(FreqBand::from_frequency_hz(2.8e9), Some(FreqBand::S));
        assert_eq!(FreqBand::from_frequency_hz(5.6e9), Some(FreqBand::C));
        assert_eq!(FreqBand::from_frequency_hz(9.4e9), Some(FreqBand::X));
        assert_eq!(FreqBand::from_frequency_hz(1.0e9), None);
        assert_eq!(FreqBand::from_frequency_hz(35.0e9), None);
    }

    #[test]
    fn test_echo_class_precipitation() {
        assert!(EchoClass::Convective.is_precipitation());
        assert!(EchoClass::Stratiform.is_precipitation());
        assert!(!EchoClass::NoEcho.is_precipitation());
        assert!(!EchoClass::WeakEcho.is_precipitation());
        assert!(!EchoClass::Uncertain.is_precipitation());
    }

    #[test]
    fn test_classification_shape_check() {
        let geom = Geometry::Cartesian {
            x_step_m: 1000.0,
            y_step_m: 1000.0,
        };
        let result = EchoClassification::new(vec![EchoClass::NoEcho; 5], GridShape::new(2, 3), geom);
        assert!(matches!(result, Err(FieldError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_feature_sizes() {
        let ids = vec![-1, 0, 0, 1, -1, 1];
        let map = FeatureMap::new(ids, 2, GridShape::new(2, 3));

        assert_eq!(map.feature_sizes(), vec![2, 2]);
        assert_eq!(map.id(0, 1), 0);
        assert_eq!(map.id(1, 0), 1);
    }
}
