//! Connected convective-feature detection.
//!
//! Groups adjacent convective gates into discrete features using
//! connected-component labeling over an atomic union-find:
//!
//! 1. **Parallel union**: each convective gate unions with its convective
//!    neighbors (4- or 8-connected, azimuth seam wrapped when cyclic)
//! 2. **Deterministic relabel**: a sequential raster scan numbers features
//!    in order of first-encountered gate, so ids are reproducible no
//!    matter how the parallel merge interleaved
//! 3. **Speckle filter**: features below a minimum gate count are erased
//!    and the remaining ids renumbered
//! 4. **Dilation**: each feature optionally claims a halo of surrounding
//!    gates within a physical radius, never overwriting another core

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{Connectivity, FeatureConfig};
use crate::core::field::GridShape;
use crate::core::geometry::{Geometry, GeometryError};
use crate::core::labels::{EchoClass, EchoClassification, FeatureMap};

use super::{resolve_row, row_offset_bounds};

/// Errors from feature detection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Mask length {len} does not match shape {rows}x{cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        len: usize,
    },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Atomic union-find for lock-free parallel component merging.
///
/// Uses path compression with compare-and-swap updates; union order does
/// not matter because ids are assigned afterwards by raster scan.
struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    fn new(size: usize) -> Self {
        let parent = (0..size).map(AtomicUsize::new).collect();
        Self { parent }
    }

    /// Find the root of the set containing `x` with path compression.
    fn find(&self, mut x: usize) -> usize {
        loop {
            let p = self.parent[x].load(Ordering::Relaxed);
            if p == x {
                return x;
            }
            let gp = self.parent[p].load(Ordering::Relaxed);
            if gp != p {
                // Point x at its grandparent; a lost race just retries.
                let _ = self.parent[x].compare_exchange_weak(
                    p,
                    gp,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
            x = p;
        }
    }

    /// Union the sets containing `x` and `y`.
    fn union(&self, x: usize, y: usize) {
        loop {
            let root_x = self.find(x);
            let root_y = self.find(y);

            if root_x == root_y {
                return;
            }

            // Smaller root always points to the larger for rough balance.
            let (small, large) = if root_x < root_y {
                (root_x, root_y)
            } else {
                (root_y, root_x)
            };

            if self.parent[small]
                .compare_exchange_weak(small, large, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }
}

/// Forward-only neighbor offsets; unions are symmetric so scanning each
/// pair once suffices.
fn neighbor_offsets(connectivity: Connectivity) -> &'static [(isize, isize)] {
    match connectivity {
        Connectivity::Four => &[(0, 1), (1, 0)],
        Connectivity::Eight => &[(0, 1), (1, -1), (1, 0), (1, 1)],
    }
}

/// Detect connected convective features in a classification.
///
/// Convenience wrapper over [`detect_feature_mask`] selecting the
/// Convective gates.
pub fn detect_features(
    labels: &EchoClassification,
    config: &FeatureConfig,
) -> Result<FeatureMap, FeatureError> {
    let mask: Vec<bool> = labels
        .labels()
        .iter()
        .map(|&l| l == EchoClass::Convective)
        .collect();

    detect_feature_mask(&mask, labels.shape(), labels.geometry(), config)
}

/// Detect connected features in a boolean gate mask.
///
/// Feature ids are `0..count`, numbered in increasing order of each
/// feature's first gate under a row-major raster scan; `-1` marks gates in
/// no feature. With `dilation_radius_m` set, every feature claims
/// surrounding non-core gates within that physical radius; a contested
/// halo gate goes to the lowest feature id.
///
/// # Errors
///
/// Fails with [`FeatureError::ShapeMismatch`] if the mask length disagrees
/// with the shape, or [`GeometryError`] for invalid spacing or dilation
/// radius — both before any labeling work.
pub fn detect_feature_mask(
    mask: &[bool],
    shape: GridShape,
    geometry: Geometry,
    config: &FeatureConfig,
) -> Result<FeatureMap, FeatureError> {
    if mask.len() != shape.len() {
        return Err(FeatureError::ShapeMismatch {
            rows: shape.rows,
            cols: shape.cols,
            len: mask.len(),
        });
    }
    geometry.validate()?;
    if let Some(radius) = config.dilation_radius_m {
        Geometry::validate_radius(radius)?;
    }

    let n = shape.len();
    let n_rows = shape.rows;
    let n_cols = shape.cols;
    let cyclic = geometry.is_cyclic();

    // Phase 1: parallel union of adjacent convective gates.
    let uf = AtomicUnionFind::new(n);
    let offsets = neighbor_offsets(config.connectivity);

    (0..n).into_par_iter().for_each(|idx| {
        if !mask[idx] {
            return;
        }
        let row = idx / n_cols;
        let col = idx % n_cols;

        for &(d_row, d_col) in offsets {
            let rr = match resolve_row(row, d_row, n_rows, cyclic) {
                Some(rr) => rr,
                None => continue,
            };
            let cc = col as isize + d_col;
            if cc < 0 || cc >= n_cols as isize {
                continue;
            }
            let neighbor = rr * n_cols + cc as usize;
            if neighbor != idx && mask[neighbor] {
                uf.union(idx, neighbor);
            }
        }
    });

    // Phase 2: deterministic raster relabel.
    let mut root_to_id: HashMap<usize, i32> = HashMap::new();
    let mut ids = vec![-1i32; n];
    let mut next_id = 0i32;

    for (idx, &in_mask) in mask.iter().enumerate() {
        if in_mask {
            let root = uf.find(idx);
            let id = *root_to_id.entry(root).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            ids[idx] = id;
        }
    }
    let mut count = next_id as usize;

    // Phase 3: erase speckle features and renumber.
    if config.min_feature_gates > 1 && count > 0 {
        let mut sizes = vec![0usize; count];
        for &id in &ids {
            if id >= 0 {
                sizes[id as usize] += 1;
            }
        }

        let mut remap = vec![-1i32; count];
        let mut kept = 0i32;
        for (id, &size) in sizes.iter().enumerate() {
            if size >= config.min_feature_gates {
                remap[id] = kept;
                kept += 1;
            }
        }

        for id in ids.iter_mut() {
            if *id >= 0 {
                *id = remap[*id as usize];
            }
        }
        count = kept as usize;
    }

    // Phase 4: dilation halo.
    if let Some(radius) = config.dilation_radius_m {
        if radius > 0.0 && count > 0 {
            let core_ids = ids;
            ids = (0..n)
                .into_par_iter()
                .map(|idx| {
                    if core_ids[idx] >= 0 {
                        return core_ids[idx];
                    }
                    let row = idx / n_cols;
                    let col = idx % n_cols;

                    let win = geometry.window(radius, col);
                    let (d_lo, d_hi) = row_offset_bounds(win.rows, n_rows, cyclic);
                    let c_lo = col.saturating_sub(win.cols);
                    let c_hi = col.saturating_add(win.cols).min(n_cols - 1);

                    let mut best = -1i32;
                    for d_row in d_lo..=d_hi {
                        let rr = match resolve_row(row, d_row, n_rows, cyclic) {
                            Some(rr) => rr,
                            None => continue,
                        };
                        for cc in c_lo..=c_hi {
                            let id = core_ids[rr * n_cols + cc];
                            if id >= 0 && (best < 0 || id < best) {
                                best = id;
                            }
                        }
                    }
                    best
                })
                .collect();
        }
    }

    debug!("detected {} convective features", count);

    Ok(FeatureMap::new(ids, count, shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cartesian_1km() -> Geometry {
        Geometry::Cartesian {
            x_step_m: 1000.0,
            y_step_m: 1000.0,
        }
    }

    fn mask_from(shape: GridShape, convective: &[(usize, usize)]) -> Vec<bool> {
        let mut mask = vec![false; shape.len()];
        for &(row, col) in convective {
            mask[shape.index(row, col)] = true;
        }
        mask
    }

    #[test]
    fn test_isolated_gate_is_single_feature() {
        let shape = GridShape::new(5, 5);
        let mask = mask_from(shape, &[(2, 2)]);

        let map =
            detect_feature_mask(&mask, shape, cartesian_1km(), &FeatureConfig::default()).unwrap();

        assert_eq!(map.count(), 1);
        assert_eq!(map.id(2, 2), 0);
        assert_eq!(map.feature_sizes(), vec![1]);
    }

    #[test]
    fn test_two_separate_features_raster_order() {
        let shape = GridShape::new(6, 6);
        // Second blob's first gate comes later in raster order.
        let mask = mask_from(shape, &[(1, 1), (1, 2), (4, 4), (4, 5), (5, 4)]);

        let map =
            detect_feature_mask(&mask, shape, cartesian_1km(), &FeatureConfig::default()).unwrap();

        assert_eq!(map.count(), 2);
        assert_eq!(map.id(1, 1), 0);
        assert_eq!(map.id(1, 2), 0);
        assert_eq!(map.id(4, 4), 1);
        assert_eq!(map.id(5, 4), 1);
        assert_eq!(map.feature_sizes(), vec![2, 3]);
    }

    #[test]
    fn test_diagonal_connectivity() {
        let shape = GridShape::new(4, 4);
        let mask = mask_from(shape, &[(0, 0), (1, 1), (2, 2)]);

        // Eight-connected: one diagonal chain.
        let map =
            detect_feature_mask(&mask, shape, cartesian_1km(), &FeatureConfig::default()).unwrap();
        assert_eq!(map.count(), 1);

        // Four-connected: three isolated gates.
        let config = FeatureConfig {
            connectivity: Connectivity::Four,
            ..FeatureConfig::default()
        };
        let map = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();
        assert_eq!(map.count(), 3);
        assert_eq!(map.id(0, 0), 0);
        assert_eq!(map.id(1, 1), 1);
        assert_eq!(map.id(2, 2), 2);
    }

    #[test]
    fn test_cyclic_seam_joins_features() {
        let geom = Geometry::Polar {
            range_step_m: 1000.0,
            range_start_m: 0.0,
            azimuth_step_deg: 10.0,
            cyclic: true,
        };
        let shape = GridShape::new(36, 4);
        // A blob straddling the 0/360-degree seam.
        let mask = mask_from(shape, &[(35, 2), (0, 2)]);

        let map = detect_feature_mask(&mask, shape, geom, &FeatureConfig::default()).unwrap();
        assert_eq!(map.count(), 1);
        assert_eq!(map.id(35, 2), map.id(0, 2));

        // Without the wrap they stay apart.
        let clipped = Geometry::Polar {
            range_step_m: 1000.0,
            range_start_m: 0.0,
            azimuth_step_deg: 10.0,
            cyclic: false,
        };
        let map = detect_feature_mask(&mask, shape, clipped, &FeatureConfig::default()).unwrap();
        assert_eq!(map.count(), 2);
    }

    #[test]
    fn test_speckle_filter() {
        let shape = GridShape::new(6, 6);
        // One 3-gate feature and one isolated speckle.
        let mask = mask_from(shape, &[(1, 1), (1, 2), (2, 1), (4, 5)]);

        let config = FeatureConfig {
            min_feature_gates: 2,
            ..FeatureConfig::default()
        };
        let map = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();

        assert_eq!(map.count(), 1);
        assert_eq!(map.id(1, 1), 0);
        assert_eq!(map.id(4, 5), -1);
    }

    #[test]
    fn test_dilation_halo() {
        let shape = GridShape::new(7, 7);
        let mask = mask_from(shape, &[(3, 3)]);

        let config = FeatureConfig {
            dilation_radius_m: Some(1000.0),
            ..FeatureConfig::default()
        };
        let map = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();

        assert_eq!(map.count(), 1);
        // Halo: the 3x3 neighborhood takes the feature id.
        assert_eq!(map.id(3, 3), 0);
        assert_eq!(map.id(2, 3), 0);
        assert_eq!(map.id(4, 4), 0);
        // Beyond the radius stays unmarked.
        assert_eq!(map.id(1, 3), -1);
        assert_eq!(map.id(0, 0), -1);
    }

    #[test]
    fn test_dilation_never_overwrites_other_core() {
        let shape = GridShape::new(5, 7);
        // Two cores three gates apart; the gap is contested halo.
        let mask = mask_from(shape, &[(2, 1), (2, 5)]);

        let config = FeatureConfig {
            dilation_radius_m: Some(3000.0),
            ..FeatureConfig::default()
        };
        let map = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();

        assert_eq!(map.count(), 2);
        // Cores keep their own ids despite overlapping halos.
        assert_eq!(map.id(2, 1), 0);
        assert_eq!(map.id(2, 5), 1);
        // Contested gate between them goes to the lower id.
        assert_eq!(map.id(2, 3), 0);
    }

    #[test]
    fn test_empty_mask_no_features() {
        let shape = GridShape::new(4, 4);
        let mask = vec![false; shape.len()];

        let map =
            detect_feature_mask(&mask, shape, cartesian_1km(), &FeatureConfig::default()).unwrap();

        assert_eq!(map.count(), 0);
        assert!(map.ids().iter().all(|&id| id == -1));
    }

    #[test]
    fn test_mask_length_mismatch() {
        let shape = GridShape::new(4, 4);
        let mask = vec![false; 3];

        assert!(matches!(
            detect_feature_mask(&mask, shape, cartesian_1km(), &FeatureConfig::default()),
            Err(FeatureError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_repeated_invocation_same_ids() {
        let shape = GridShape::new(10, 10);
        let mask = mask_from(
            shape,
            &[(0, 9), (1, 8), (1, 9), (5, 0), (5, 1), (9, 9), (2, 4)],
        );

        let config = FeatureConfig::default();
        let first = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();
        let second = detect_feature_mask(&mask, shape, cartesian_1km(), &config).unwrap();

        assert_eq!(first.ids(), second.ids());
        assert_eq!(first.count(), second.count());
    }

    #[test]
    fn test_spike_classification_yields_single_feature() {
        use crate::config::ConvStratConfig;
        use crate::core::field::MomentField;
        use crate::processors::classify_conv_strat;

        let shape = GridShape::new(9, 9);
        let mut field = MomentField::filled(15.0, shape, cartesian_1km());
        field.set(4, 4, 55.0);

        let conv_config = ConvStratConfig {
            background_radius_m: 2000.0,
            ..ConvStratConfig::default()
        };
        let labels = classify_conv_strat(&field, &conv_config).unwrap();

        let map = detect_features(&labels, &FeatureConfig::default()).unwrap();
        assert_eq!(map.count(), 1);
        assert_eq!(map.feature_sizes(), vec![1]);
        assert_eq!(map.id(4, 4), 0);

        // With dilation, the spike gate keeps its id and gains a halo.
        let config = FeatureConfig {
            dilation_radius_m: Some(1000.0),
            ..FeatureConfig::default()
        };
        let map = detect_features(&labels, &config).unwrap();
        assert_eq!(map.count(), 1);
        assert_eq!(map.id(4, 4), 0);
        assert_eq!(map.id(3, 4), 0);
        assert_eq!(map.id(0, 0), -1);
    }

    #[test]
    fn test_detect_features_from_classification() {
        let geom = cartesian_1km();
        let shape = GridShape::new(3, 3);
        let mut labels = vec![EchoClass::Stratiform; 9];
        labels[shape.index(1, 1)] = EchoClass::Convective;
        let classification = EchoClassification::new(labels, shape, geom).unwrap();

        let map = detect_features(&classification, &FeatureConfig::default()).unwrap();
        assert_eq!(map.count(), 1);
        assert_eq!(map.id(1, 1), 0);
        assert_eq!(map.id(0, 0), -1);
    }
}
