//! Moment field container.
//!
//! A [`MomentField`] is a single radar moment (reflectivity, differential
//! reflectivity, specific differential phase, correlation coefficient, ...)
//! stored row-major with its grid shape and [`Geometry`]. Missing gates are
//! NaN; any non-finite value is treated as missing throughout the crate.

use thiserror::Error;

use super::geometry::{Geometry, GeometryError};

/// Errors from malformed field construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("Data length {len} does not match shape {rows}x{cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        len: usize,
    },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Grid dimensions in gates.
///
/// `rows` counts azimuth rays (polar) or y cells (Cartesian); `cols` counts
/// range gates or x cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Number of rows (azimuth rays / y cells).
    pub rows: usize,
    /// Number of columns (range gates / x cells).
    pub cols: usize,
}

impl GridShape {
    /// Create a new grid shape.
    #[inline]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of gates.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns true if the grid has no gates.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat row-major index of `(row, col)`.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }
}

/// A single radar moment with shape and geometry.
///
/// Immutable once constructed; classifiers borrow it read-only and return
/// new arrays of matching shape.
#[derive(Debug, Clone)]
pub struct MomentField {
    data: Vec<f32>,
    shape: GridShape,
    geometry: Geometry,
}

impl MomentField {
    /// Create a field from row-major data.
    ///
    /// Fails if the data length disagrees with the shape or the geometry
    /// has invalid spacing.
    pub fn new(data: Vec<f32>, shape: GridShape, geometry: Geometry) -> Result<Self, FieldError> {
        if data.len() != shape.len() {
            return Err(FieldError::ShapeMismatch {
                rows: shape.rows,
                cols: shape.cols,
                len: data.len(),
            });
        }
        geometry.validate()?;

        Ok(Self {
            data,
            shape,
            geometry,
        })
    }

    /// Construct from parts already known to be consistent.
    pub(crate) fn from_raw(data: Vec<f32>, shape: GridShape, geometry: Geometry) -> Self {
        debug_assert_eq!(data.len(), shape.len());
        Self {
            data,
            shape,
            geometry,
        }
    }

    /// Create a field filled with a constant value.
    pub fn filled(value: f32, shape: GridShape, geometry: Geometry) -> Self {
        Self {
            data: vec![value; shape.len()],
            shape,
            geometry,
        }
    }

    /// Create an all-missing field.
    pub fn missing(shape: GridShape, geometry: Geometry) -> Self {
        Self::filled(f32::NAN, shape, geometry)
    }

    /// Grid shape.
    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Grid geometry.
    #[inline]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Row-major data slice.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at `(row, col)`. NaN marks a missing gate.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.shape.index(row, col)]
    }

    /// Set the value at `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = self.shape.index(row, col);
        self.data[idx] = value;
    }

    /// Returns true if the gate at `(row, col)` holds a valid value.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_finite()
    }

    /// Number of valid (finite) gates.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }
}
