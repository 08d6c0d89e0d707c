//! Regular n-dimensional lattices and the numeric fields stored on them.
//!
//! A [`Grid`] is an immutable description (shape, spacing, origin). A
//! [`ValueArray`] is a flat `f64` buffer laid out row-major over a grid,
//! last axis fastest. Each solver invocation allocates its own arrays;
//! nothing here is shared between jobs.

use crate::error::GridError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Integer lattice coordinates, one entry per axis.
pub type Coords = SmallVec<[usize; 4]>;

/// Serializable grid description as it appears in solver configs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Cells per axis.
    pub shape: Vec<usize>,
    /// Physical distance between neighbouring cells, per axis.
    pub spacing: Vec<f64>,
    /// Physical position of cell `[0, 0, ...]`.
    pub origin: Vec<f64>,
}

impl GridSpec {
    /// Validate and build the [`Grid`].
    pub fn build(&self) -> Result<Grid, GridError> {
        Grid::new(&self.shape, &self.spacing, &self.origin)
    }
}

/// An immutable regular lattice.
///
/// # Examples
///
/// ```
/// use pathwise_core::Grid;
///
/// let grid = Grid::new(&[3, 4], &[0.5, 0.5], &[-1.0, -1.0]).unwrap();
/// assert_eq!(grid.len(), 12);
/// assert_eq!(grid.flat_index(&[1, 2]), Some(6));
/// assert_eq!(grid.position(&[2, 0]), vec![0.0, -1.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    shape: SmallVec<[usize; 4]>,
    spacing: SmallVec<[f64; 4]>,
    origin: SmallVec<[f64; 4]>,
    strides: SmallVec<[usize; 4]>,
    len: usize,
}

impl Grid {
    /// Create a grid, validating that all three descriptions agree.
    ///
    /// Returns `Err` for mismatched lengths, zero axes or zero-length
    /// axes, non-positive or non-finite spacing, non-finite origin, or a
    /// cell count that overflows `usize`.
    pub fn new(shape: &[usize], spacing: &[f64], origin: &[f64]) -> Result<Self, GridError> {
        if shape.len() != spacing.len() || shape.len() != origin.len() {
            return Err(GridError::DimensionMismatch {
                shape: shape.len(),
                spacing: spacing.len(),
                origin: origin.len(),
            });
        }
        if shape.is_empty() || shape.contains(&0) {
            return Err(GridError::EmptyGrid);
        }
        for (axis, &value) in spacing.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(GridError::InvalidSpacing { axis, value });
            }
        }
        for (axis, &value) in origin.iter().enumerate() {
            if !value.is_finite() {
                return Err(GridError::InvalidOrigin { axis, value });
            }
        }

        let len = shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or(GridError::CellCountOverflow)?;

        let mut strides: SmallVec<[usize; 4]> = SmallVec::from_elem(1, shape.len());
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }

        Ok(Self {
            shape: SmallVec::from_slice(shape),
            spacing: SmallVec::from_slice(spacing),
            origin: SmallVec::from_slice(origin),
            strides,
            len,
        })
    }

    /// A 2-D cell-centred grid covering `[-domain, domain]²`.
    pub fn centered_2d(width: usize, height: usize, domain: f64) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid);
        }
        let dx = 2.0 * domain / width as f64;
        let dy = 2.0 * domain / height as f64;
        Self::new(
            &[width, height],
            &[dx, dy],
            &[-domain + dx / 2.0, -domain + dy / 2.0],
        )
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always returns `false`: construction rejects empty grids.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Cells per axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Spacing per axis.
    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    /// Position of the first cell.
    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    /// Row-major strides (last axis has stride 1).
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Product of the spacings.
    pub fn cell_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Flat index of `coords`, or `None` when out of bounds or of the wrong rank.
    pub fn flat_index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.ndim() {
            return None;
        }
        let mut flat = 0;
        for ((&c, &n), &stride) in coords.iter().zip(&self.shape).zip(&self.strides) {
            if c >= n {
                return None;
            }
            flat += c * stride;
        }
        Some(flat)
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn coords_of(&self, flat: usize) -> Option<Coords> {
        if flat >= self.len {
            return None;
        }
        let mut rest = flat;
        Some(
            self.strides
                .iter()
                .map(|&stride| {
                    let c = rest / stride;
                    rest %= stride;
                    c
                })
                .collect(),
        )
    }

    /// Physical position of a lattice point.
    pub fn position(&self, coords: &[usize]) -> Vec<f64> {
        coords
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(&c, (&o, &h))| o + c as f64 * h)
            .collect()
    }

    /// Nearest lattice point to `point`, clamped into the grid.
    ///
    /// Extra trailing components of `point` are ignored; missing ones
    /// resolve to index 0. Non-finite components resolve to index 0.
    pub fn nearest_coords(&self, point: &[f64]) -> Coords {
        (0..self.ndim())
            .map(|axis| {
                let x = point.get(axis).copied().unwrap_or(self.origin[axis]);
                let rel = ((x - self.origin[axis]) / self.spacing[axis]).round();
                if !rel.is_finite() || rel <= 0.0 {
                    0
                } else {
                    (rel as usize).min(self.shape[axis] - 1)
                }
            })
            .collect()
    }

    /// Flat index of the lattice point nearest to `point`.
    pub fn nearest_index(&self, point: &[f64]) -> usize {
        let coords = self.nearest_coords(point);
        coords
            .iter()
            .zip(&self.strides)
            .map(|(&c, &stride)| c * stride)
            .sum()
    }

    /// Visit every cell in canonical (row-major) order.
    pub fn for_each(&self, mut f: impl FnMut(usize, &[usize], &[f64])) {
        let mut coords: Coords = SmallVec::from_elem(0, self.ndim());
        let mut position: Vec<f64> = self.origin.to_vec();
        for flat in 0..self.len {
            f(flat, &coords, &position);
            // Odometer increment, last axis fastest.
            for axis in (0..self.ndim()).rev() {
                coords[axis] += 1;
                if coords[axis] < self.shape[axis] {
                    position[axis] = self.origin[axis] + coords[axis] as f64 * self.spacing[axis];
                    break;
                }
                coords[axis] = 0;
                position[axis] = self.origin[axis];
            }
        }
    }
}

/// A flat numeric field over a [`Grid`].
#[derive(Debug, PartialEq)]
pub struct ValueArray {
    grid: Grid,
    data: Vec<f64>,
}

impl ValueArray {
    /// All-zero field.
    pub fn zeros(grid: Grid) -> Self {
        Self::filled(grid, 0.0)
    }

    /// Field with every cell set to `value`.
    pub fn filled(grid: Grid, value: f64) -> Self {
        let data = vec![value; grid.len()];
        Self { grid, data }
    }

    /// Wrap an existing buffer, checking its length.
    pub fn from_vec(grid: Grid, data: Vec<f64>) -> Result<Self, GridError> {
        if data.len() != grid.len() {
            return Err(GridError::LengthMismatch {
                expected: grid.len(),
                actual: data.len(),
            });
        }
        Ok(Self { grid, data })
    }

    /// Build a field by evaluating `f` at every cell position.
    pub fn from_fn(grid: Grid, mut f: impl FnMut(&[usize], &[f64]) -> f64) -> Self {
        let mut data = vec![0.0; grid.len()];
        grid.for_each(|flat, coords, position| data[flat] = f(coords, position));
        Self { grid, data }
    }

    /// The grid this field lives on.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Value at `coords`.
    pub fn get(&self, coords: &[usize]) -> Option<f64> {
        self.grid.flat_index(coords).map(|i| self.data[i])
    }

    /// Overwrite the value at `coords`.
    pub fn set(&mut self, coords: &[usize], value: f64) -> Result<(), GridError> {
        let i = self
            .grid
            .flat_index(coords)
            .ok_or_else(|| GridError::CoordOutOfBounds {
                coords: coords.to_vec(),
                shape: self.grid.shape().to_vec(),
            })?;
        self.data[i] = value;
        Ok(())
    }

    /// Flat view.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable flat view.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume the field, returning the buffer.
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Plain sum of all cells.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Sum of all cells times the cell volume.
    pub fn integral(&self) -> f64 {
        self.sum() * self.grid.cell_volume()
    }

    /// Largest absolute cell-wise difference. Panics in debug builds if the
    /// grids differ in size.
    pub fn max_abs_diff(&self, other: &ValueArray) -> f64 {
        debug_assert_eq!(self.data.len(), other.data.len());
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// First non-finite cell, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.data.iter().position(|v| !v.is_finite())
    }

    /// Whether every cell is finite.
    pub fn is_finite(&self) -> bool {
        self.first_non_finite().is_none()
    }

    /// Explicit deep copy. Kept separate from `Clone` so buffers are not
    /// duplicated implicitly.
    pub fn duplicate(&self) -> Self {
        Self {
            grid: self.grid.clone(),
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = Grid::new(&[2, 2], &[1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GridError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_empty_and_zero_axes() {
        assert_eq!(Grid::new(&[], &[], &[]).unwrap_err(), GridError::EmptyGrid);
        assert_eq!(
            Grid::new(&[3, 0], &[1.0, 1.0], &[0.0, 0.0]).unwrap_err(),
            GridError::EmptyGrid
        );
    }

    #[test]
    fn rejects_bad_spacing_and_origin() {
        assert!(matches!(
            Grid::new(&[3], &[0.0], &[0.0]).unwrap_err(),
            GridError::InvalidSpacing { axis: 0, .. }
        ));
        assert!(matches!(
            Grid::new(&[3, 3], &[1.0, f64::NAN], &[0.0, 0.0]).unwrap_err(),
            GridError::InvalidSpacing { axis: 1, .. }
        ));
        assert!(matches!(
            Grid::new(&[3], &[1.0], &[f64::INFINITY]).unwrap_err(),
            GridError::InvalidOrigin { axis: 0, .. }
        ));
    }

    #[test]
    fn strides_are_row_major() {
        let grid = Grid::new(&[2, 3, 4], &[1.0; 3], &[0.0; 3]).unwrap();
        assert_eq!(grid.strides(), &[12, 4, 1]);
        assert_eq!(grid.len(), 24);
    }

    #[test]
    fn for_each_visits_in_canonical_order() {
        let grid = Grid::new(&[2, 3], &[0.5, 1.0], &[-1.0, 0.0]).unwrap();
        let mut seen = Vec::new();
        grid.for_each(|flat, coords, pos| seen.push((flat, coords.to_vec(), pos.to_vec())));
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], (0, vec![0, 0], vec![-1.0, 0.0]));
        assert_eq!(seen[4], (4, vec![1, 1], vec![-0.5, 1.0]));
        assert_eq!(seen[5], (5, vec![1, 2], vec![-0.5, 2.0]));
    }

    #[test]
    fn nearest_coords_clamps() {
        let grid = Grid::new(&[5], &[1.0], &[0.0]).unwrap();
        assert_eq!(grid.nearest_coords(&[2.4]).to_vec(), vec![2]);
        assert_eq!(grid.nearest_coords(&[-7.0]).to_vec(), vec![0]);
        assert_eq!(grid.nearest_coords(&[99.0]).to_vec(), vec![4]);
        assert_eq!(grid.nearest_coords(&[f64::NAN]).to_vec(), vec![0]);
    }

    #[test]
    fn centered_grid_is_symmetric() {
        let grid = Grid::centered_2d(4, 4, 2.0).unwrap();
        assert_eq!(grid.spacing(), &[1.0, 1.0]);
        assert_eq!(grid.position(&[0, 0]), vec![-1.5, -1.5]);
        assert_eq!(grid.position(&[3, 3]), vec![1.5, 1.5]);
    }

    #[test]
    fn value_array_length_checked() {
        let grid = Grid::new(&[2, 2], &[1.0, 1.0], &[0.0, 0.0]).unwrap();
        let err = ValueArray::from_vec(grid.clone(), vec![0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            GridError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        );
        let mut field = ValueArray::from_vec(grid, vec![1.0; 4]).unwrap();
        field.set(&[1, 0], 5.0).unwrap();
        assert_eq!(field.get(&[1, 0]), Some(5.0));
        assert_eq!(field.sum(), 8.0);
        assert!(field.set(&[2, 0], 1.0).is_err());
    }

    #[test]
    fn integral_uses_cell_volume() {
        let grid = Grid::new(&[2, 2], &[0.5, 0.25], &[0.0, 0.0]).unwrap();
        let field = ValueArray::filled(grid, 2.0);
        assert!((field.integral() - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn flat_index_round_trips(
            a in 1usize..6, b in 1usize..6, c in 1usize..6, seed in any::<usize>()
        ) {
            let grid = Grid::new(&[a, b, c], &[1.0; 3], &[0.0; 3]).unwrap();
            let flat = seed % grid.len();
            let coords = grid.coords_of(flat).unwrap();
            prop_assert_eq!(grid.flat_index(&coords), Some(flat));
        }
    }
}
