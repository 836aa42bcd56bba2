//! Configuration types for the echo classifiers.
//!
//! Threshold curves and fuzzy membership functions are serializable
//! parameter sets rather than code branches, so alternative published
//! classification criteria are swappable configurations. All types
//! round-trip through YAML.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::labels::{FreqBand, HydroClass};

/// Required peak excess over background as a function of background value.
///
/// All variants are monotonic non-increasing in background: the stronger
/// the ambient echo, the smaller the excess needed to call a gate
/// convective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum ThresholdCurve {
    /// Fixed excess in dB regardless of background.
    Constant { excess_db: f32 },

    /// Classic parabolic peakedness curve: `max_excess` below 0 dBZ
    /// background, `max_excess - bg^2 / scale` up to the zero crossing,
    /// 0 beyond it.
    Parabolic { max_excess_db: f32, scale_db2: f32 },

    /// Cosine ramp: `max_excess * cos(pi * bg / (2 * halfwidth))` for
    /// backgrounds in `[0, halfwidth)`, 0 at and beyond `halfwidth`.
    Cosine {
        max_excess_db: f32,
        halfwidth_db: f32,
    },
}

impl ThresholdCurve {
    /// Required excess in dB for the given background value.
    pub fn required_excess(&self, background_dbz: f32) -> f32 {
        match *self {
            ThresholdCurve::Constant { excess_db } => excess_db,
            ThresholdCurve::Parabolic {
                max_excess_db,
                scale_db2,
            } => {
                if background_dbz < 0.0 {
                    max_excess_db
                } else {
                    (max_excess_db - background_dbz * background_dbz / scale_db2).max(0.0)
                }
            }
            ThresholdCurve::Cosine {
                max_excess_db,
                halfwidth_db,
            } => {
                if background_dbz < 0.0 {
                    max_excess_db
                } else if background_dbz >= halfwidth_db {
                    0.0
                } else {
                    max_excess_db
                        * (std::f32::consts::PI * background_dbz / (2.0 * halfwidth_db)).cos()
                }
            }
        }
    }
}

/// Configuration for the convective/stratiform path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvStratConfig {
    /// Physical radius for background averaging in meters.
    #[serde(default = "default_background_radius_m")]
    pub background_radius_m: f32,

    /// Required peak excess as a function of background.
    #[serde(default = "default_threshold_curve")]
    pub threshold: ThresholdCurve,

    /// Values below this are NoEcho (dBZ).
    #[serde(default = "default_min_detectable_dbz")]
    pub min_detectable_dbz: f32,

    /// Values below this are WeakEcho (dBZ).
    #[serde(default = "default_weak_echo_dbz")]
    pub weak_echo_dbz: f32,

    /// Absolute intensity floor for a Convective label (dBZ).
    #[serde(default = "default_convective_floor_dbz")]
    pub convective_floor_dbz: f32,

    /// Values at or above this are Convective regardless of background.
    #[serde(default = "default_always_convective_dbz")]
    pub always_convective_dbz: Option<f32>,
}

fn default_background_radius_m() -> f32 {
    11_000.0
}

fn default_threshold_curve() -> ThresholdCurve {
    ThresholdCurve::Parabolic {
        max_excess_db: 10.0,
        scale_db2: 180.0,
    }
}

fn default_min_detectable_dbz() -> f32 {
    5.0
}

fn default_weak_echo_dbz() -> f32 {
    10.0
}

fn default_convective_floor_dbz() -> f32 {
    25.0
}

fn default_always_convective_dbz() -> Option<f32> {
    Some(40.0)
}

impl Default for ConvStratConfig {
    fn default() -> Self {
        Self {
            background_radius_m: default_background_radius_m(),
            threshold: default_threshold_curve(),
            min_detectable_dbz: default_min_detectable_dbz(),
            weak_echo_dbz: default_weak_echo_dbz(),
            convective_floor_dbz: default_convective_floor_dbz(),
            always_convective_dbz: default_always_convective_dbz(),
        }
    }
}

/// Gate adjacency rule for connected-component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge-adjacent neighbors only.
    Four,
    /// Edge- and corner-adjacent neighbors.
    Eight,
}

/// Configuration for convective feature detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Adjacency rule for grouping convective gates.
    #[serde(default = "default_connectivity")]
    pub connectivity: Connectivity,

    /// Optional physical radius to dilate each feature outward (meters).
    #[serde(default)]
    pub dilation_radius_m: Option<f32>,

    /// Features smaller than this many gates are discarded as speckle.
    #[serde(default = "default_min_feature_gates")]
    pub min_feature_gates: usize,
}

fn default_connectivity() -> Connectivity {
    Connectivity::Eight
}

fn default_min_feature_gates() -> usize {
    1
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            connectivity: default_connectivity(),
            dilation_radius_m: None,
            min_feature_gates: default_min_feature_gates(),
        }
    }
}

/// Trapezoidal membership function with a per-moment weight.
///
/// Membership ramps linearly from 0 at `breakpoints[0]` to 1 at
/// `breakpoints[1]`, holds 1 through `breakpoints[2]`, and ramps back to 0
/// at `breakpoints[3]`. Breakpoints must be non-decreasing and the weight
/// positive; both are validated before any gate is scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MembershipFunction {
    /// Trapezoid breakpoints `[a, b, c, d]` in the moment's units.
    pub breakpoints: [f32; 4],

    /// Relative weight of this moment within its class.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl MembershipFunction {
    /// Create a membership function from breakpoints and weight.
    pub fn new(breakpoints: [f32; 4], weight: f32) -> Self {
        Self {
            breakpoints,
            weight,
        }
    }

    /// Degree of membership in `[0, 1]` for a moment value.
    ///
    /// Non-finite values score 0; missing-data weighting is handled by the
    /// classifier, not here.
    pub fn evaluate(&self, value: f32) -> f32 {
        let [a, b, c, d] = self.breakpoints;

        if !value.is_finite() || value < a || value > d {
            0.0
        } else if value >= b && value <= c {
            1.0
        } else if value < b {
            (value - a) / (b - a)
        } else {
            (d - value) / (d - c)
        }
    }
}

/// A hydrometeor class with its per-moment membership functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyClassDefinition {
    /// Label assigned when this class wins.
    pub class: HydroClass,

    /// Membership function per moment name (e.g. "zh", "zdr", "kdp",
    /// "rhohv"). Ordered map so scores accumulate in a deterministic
    /// order.
    pub members: BTreeMap<String, MembershipFunction>,
}

impl FuzzyClassDefinition {
    /// Sum of all member weights.
    pub fn nominal_weight(&self) -> f32 {
        self.members.values().map(|m| m.weight).sum()
    }
}

/// Configuration for the fuzzy hydrometeor classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydroConfig {
    /// Class definitions, in priority order for exact-tie resolution.
    #[serde(default = "default_hydro_classes")]
    pub classes: Vec<FuzzyClassDefinition>,

    /// Gates whose winning score falls below this are Unclassified.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// A class is excluded at a gate when its available weight (moments
    /// actually present there) falls below this fraction of its nominal
    /// weight.
    #[serde(default = "default_min_weight_fraction")]
    pub min_weight_fraction: f32,
}

fn default_hydro_classes() -> Vec<FuzzyClassDefinition> {
    default_class_definitions(FreqBand::S)
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_min_weight_fraction() -> f32 {
    0.5
}

impl Default for HydroConfig {
    fn default() -> Self {
        Self {
            classes: default_hydro_classes(),
            min_confidence: default_min_confidence(),
            min_weight_fraction: default_min_weight_fraction(),
        }
    }
}

/// Built-in class definitions for a radar frequency band.
///
/// Breakpoints are a usable starting calibration over the moments "zh"
/// (dBZ), "zdr" (dB), "kdp" (deg/km), and "rhohv". KDP breakpoints are
/// scaled with frequency relative to S band (KDP grows roughly linearly
/// with frequency); deployments with their own published calibration
/// should supply it as configuration instead.
pub fn default_class_definitions(band: FreqBand) -> Vec<FuzzyClassDefinition> {
    let kdp_scale = match band {
        FreqBand::S => 1.0,
        FreqBand::C => 1.8,
        FreqBand::X => 3.1,
    };

    // (class, zh, zdr, kdp at S band, rhohv)
    let table: [(HydroClass, [f32; 4], [f32; 4], [f32; 4], [f32; 4]); 9] = [
        (
            HydroClass::LightRain,
            [5.0, 10.0, 25.0, 30.0],
            [0.0, 0.2, 1.0, 1.5],
            [-0.5, 0.0, 0.3, 0.5],
            [0.97, 0.98, 1.0, 1.0],
        ),
        (
            HydroClass::ModerateRain,
            [25.0, 30.0, 40.0, 45.0],
            [0.5, 1.0, 2.5, 3.0],
            [0.0, 0.2, 1.5, 2.0],
            [0.97, 0.98, 1.0, 1.0],
        ),
        (
            HydroClass::HeavyRain,
            [40.0, 45.0, 55.0, 60.0],
            [1.0, 1.5, 3.5, 4.0],
            [1.0, 2.0, 10.0, 12.0],
            [0.95, 0.97, 1.0, 1.0],
        ),
        (
            HydroClass::Hail,
            [50.0, 55.0, 70.0, 75.0],
            [-1.0, -0.5, 0.5, 1.0],
            [-1.0, 0.0, 1.0, 2.0],
            [0.85, 0.90, 0.96, 0.98],
        ),
        (
            HydroClass::Graupel,
            [30.0, 35.0, 50.0, 55.0],
            [-0.5, 0.0, 1.0, 1.5],
            [-0.5, 0.0, 1.0, 1.5],
            [0.90, 0.95, 0.99, 1.0],
        ),
        (
            HydroClass::DrySnow,
            [5.0, 10.0, 30.0, 35.0],
            [0.0, 0.2, 0.8, 1.2],
            [-0.2, 0.0, 0.4, 0.6],
            [0.95, 0.97, 1.0, 1.0],
        ),
        (
            HydroClass::WetSnow,
            [20.0, 25.0, 40.0, 45.0],
            [0.5, 1.0, 2.5, 3.0],
            [0.0, 0.2, 1.0, 1.5],
            [0.88, 0.92, 0.96, 0.98],
        ),
        (
            HydroClass::IceCrystals,
            [-10.0, -5.0, 15.0, 20.0],
            [1.0, 2.0, 5.0, 6.0],
            [-0.2, 0.0, 0.6, 1.0],
            [0.95, 0.97, 1.0, 1.0],
        ),
        (
            HydroClass::Mixed,
            [25.0, 30.0, 45.0, 50.0],
            [0.0, 0.5, 2.0, 2.5],
            [0.0, 0.5, 2.0, 3.0],
            [0.90, 0.93, 0.97, 0.99],
        ),
    ];

    table
        .iter()
        .map(|&(class, zh, zdr, kdp, rhohv)| {
            let scaled_kdp = [
                kdp[0] * kdp_scale,
                kdp[1] * kdp_scale,
                kdp[2] * kdp_scale,
                kdp[3] * kdp_scale,
            ];

            let mut members = BTreeMap::new();
            members.insert("zh".to_string(), MembershipFunction::new(zh, 1.0));
            members.insert("zdr".to_string(), MembershipFunction::new(zdr, 0.8));
            members.insert("kdp".to_string(), MembershipFunction::new(scaled_kdp, 1.0));
            members.insert("rhohv".to_string(), MembershipFunction::new(rhohv, 0.8));

            FuzzyClassDefinition { class, members }
        })
        .collect()
}

/// Main classifier configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub conv_strat: ConvStratConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub hydro: HydroConfig,
}

impl ClassifierConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ClassifierConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parabolic_curve_monotonic() {
        let curve = default_threshold_curve();

        assert_eq!(curve.required_excess(-5.0), 10.0);
        let mut prev = curve.required_excess(0.0);
        for bg in 1..60 {
            let excess = curve.required_excess(bg as f32);
            assert!(excess <= prev, "curve must be non-increasing");
            assert!(excess >= 0.0);
            prev = excess;
        }
        // Zero crossing: sqrt(10 * 180) ~ 42.4 dBZ.
        assert_eq!(curve.required_excess(45.0), 0.0);
    }

    #[test]
    fn test_cosine_curve() {
        let curve = ThresholdCurve::Cosine {
            max_excess_db: 8.0,
            halfwidth_db: 40.0,
        };

        assert_eq!(curve.required_excess(-1.0), 8.0);
        assert!((curve.required_excess(0.0) - 8.0).abs() < 1e-6);
        assert_eq!(curve.required_excess(40.0), 0.0);
        assert_eq!(curve.required_excess(50.0), 0.0);

        let mid = curve.required_excess(20.0);
        assert!(mid > 0.0 && mid < 8.0);
    }

    #[test]
    fn test_trapezoid_membership() {
        let mf = MembershipFunction::new([10.0, 20.0, 30.0, 40.0], 1.0);

        assert_eq!(mf.evaluate(5.0), 0.0);
        assert_eq!(mf.evaluate(10.0), 0.0);
        assert!((mf.evaluate(15.0) - 0.5).abs() < 1e-6);
        assert_eq!(mf.evaluate(20.0), 1.0);
        assert_eq!(mf.evaluate(25.0), 1.0);
        assert_eq!(mf.evaluate(30.0), 1.0);
        assert!((mf.evaluate(35.0) - 0.5).abs() < 1e-6);
        assert_eq!(mf.evaluate(40.0), 0.0);
        assert_eq!(mf.evaluate(45.0), 0.0);
        assert_eq!(mf.evaluate(f32::NAN), 0.0);
    }

    #[test]
    fn test_default_class_definitions_per_band() {
        for band in [FreqBand::S, FreqBand::C, FreqBand::X] {
            let defs = default_class_definitions(band);
            assert_eq!(defs.len(), 9);
            for def in &defs {
                assert_eq!(def.members.len(), 4);
                assert!(def.nominal_weight() > 0.0);
            }
        }

        // KDP breakpoints widen with frequency.
        let s = default_class_definitions(FreqBand::S);
        let x = default_class_definitions(FreqBand::X);
        let s_kdp = s[2].members["kdp"].breakpoints;
        let x_kdp = x[2].members["kdp"].breakpoints;
        assert!(x_kdp[2] > s_kdp[2]);
    }

    #[test]
    fn test_default_config() {
        let config = ClassifierConfig::default();
        assert_eq!(config.conv_strat.background_radius_m, 11_000.0);
        assert_eq!(config.features.connectivity, Connectivity::Eight);
        assert_eq!(config.features.min_feature_gates, 1);
        assert_eq!(config.hydro.classes.len(), 9);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.yaml");

        let mut config = ClassifierConfig::default();
        config.conv_strat.background_radius_m = 6_000.0;
        config.features.dilation_radius_m = Some(5_000.0);
        config.hydro.min_confidence = 0.4;

        config.to_yaml(&path).unwrap();
        let loaded = ClassifierConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_yaml_missing_file() {
        let result = ClassifierConfig::from_yaml("/nonexistent/classifier.yaml");
        assert!(result.is_err());
    }
}
