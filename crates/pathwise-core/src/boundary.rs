//! Edge handling for lattice fields.
//!
//! Two separate concerns live here. [`resolve_index`] decides which cell
//! an out-of-range neighbour index refers to (the *topology* at the
//! edge). [`enforce_boundary`] rewrites edge *values* before a sweep:
//! Dirichlet edges are pinned, Neumann edges copy their interior
//! neighbour. Both are pure functions of their inputs.

use crate::error::GridError;
use crate::grid::{Grid, ValueArray};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// Edge policy for one axis.
///
/// Serialized as `"clamp"`, `"wrap"`, `"neumann"` or `{"dirichlet": v}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySpec {
    /// Edge cells are held at a fixed value; out-of-range neighbours read it.
    Dirichlet(f64),
    /// Zero normal gradient: edge cells copy their interior neighbour.
    Neumann,
    /// Out-of-range indices saturate to the nearest edge cell.
    Clamp,
    /// Periodic: out-of-range indices wrap to the opposite side.
    Wrap,
}

impl Default for BoundarySpec {
    fn default() -> Self {
        Self::Clamp
    }
}

/// Resolve `index` along `axis` under `spec`.
///
/// In-range indices map to themselves. `Clamp` and `Neumann` saturate to
/// `[0, len-1]`; `Wrap` uses a sign-correct modulo so `-1` maps to
/// `len-1`; `Dirichlet` returns `None` for out-of-range indices, meaning
/// the caller substitutes the fixed boundary value.
///
/// # Examples
///
/// ```
/// use pathwise_core::{resolve_index, BoundarySpec, Grid};
///
/// let grid = Grid::new(&[5], &[1.0], &[0.0]).unwrap();
/// assert_eq!(resolve_index(&grid, 0, -1, BoundarySpec::Wrap), Some(4));
/// assert_eq!(resolve_index(&grid, 0, 7, BoundarySpec::Clamp), Some(4));
/// assert_eq!(resolve_index(&grid, 0, 5, BoundarySpec::Dirichlet(0.0)), None);
/// ```
pub fn resolve_index(grid: &Grid, axis: usize, index: isize, spec: BoundarySpec) -> Option<usize> {
    let len = grid.shape()[axis] as isize;
    if index >= 0 && index < len {
        return Some(index as usize);
    }
    match spec {
        BoundarySpec::Dirichlet(_) => None,
        BoundarySpec::Clamp | BoundarySpec::Neumann => Some(index.clamp(0, len - 1) as usize),
        BoundarySpec::Wrap => Some((((index % len) + len) % len) as usize),
    }
}

/// Edge policy for every axis of a grid.
///
/// Holds either one spec applied to all axes or exactly one spec per
/// axis. Deserializes from a single spec or a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoundaryRepr", into = "BoundaryRepr")]
pub struct Boundary {
    axes: SmallVec<[BoundarySpec; 4]>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BoundaryRepr {
    Uniform(BoundarySpec),
    PerAxis(Vec<BoundarySpec>),
}

impl From<BoundaryRepr> for Boundary {
    fn from(repr: BoundaryRepr) -> Self {
        match repr {
            BoundaryRepr::Uniform(spec) => Self::uniform(spec),
            BoundaryRepr::PerAxis(specs) => Self::per_axis(specs),
        }
    }
}

impl From<Boundary> for BoundaryRepr {
    fn from(b: Boundary) -> Self {
        if b.axes.len() == 1 {
            Self::Uniform(b.axes[0])
        } else {
            Self::PerAxis(b.axes.into_vec())
        }
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::uniform(BoundarySpec::Clamp)
    }
}

impl Boundary {
    /// The same policy on every axis.
    pub fn uniform(spec: BoundarySpec) -> Self {
        Self {
            axes: smallvec![spec],
        }
    }

    /// One policy per axis. An empty list means clamp everywhere.
    pub fn per_axis(specs: Vec<BoundarySpec>) -> Self {
        if specs.is_empty() {
            return Self::default();
        }
        Self {
            axes: SmallVec::from_vec(specs),
        }
    }

    /// Policy for `axis`.
    pub fn spec(&self, axis: usize) -> BoundarySpec {
        if self.axes.len() == 1 {
            self.axes[0]
        } else {
            self.axes.get(axis).copied().unwrap_or_default()
        }
    }

    /// Check that a per-axis description matches the grid rank.
    pub fn check(&self, grid: &Grid) -> Result<(), GridError> {
        if self.axes.len() != 1 && self.axes.len() != grid.ndim() {
            return Err(GridError::BoundaryAxisMismatch {
                grid: grid.ndim(),
                boundary: self.axes.len(),
            });
        }
        Ok(())
    }

    /// Whether every axis is mass-conserving under a zero-flux or periodic
    /// discretization (i.e. no Dirichlet axis).
    pub fn is_closed(&self) -> bool {
        !self
            .axes
            .iter()
            .any(|s| matches!(s, BoundarySpec::Dirichlet(_)))
    }

    /// Value of the neighbour of `flat` displaced by `offset` cells along
    /// `axis`, honouring this boundary.
    pub fn sample(&self, values: &ValueArray, flat: usize, axis: usize, offset: isize) -> f64 {
        let grid = values.grid();
        let stride = grid.strides()[axis];
        let len = grid.shape()[axis];
        let c = (flat / stride) % len;
        let spec = self.spec(axis);
        match resolve_index(grid, axis, c as isize + offset, spec) {
            Some(nc) => values.as_slice()[flat - c * stride + nc * stride],
            None => match spec {
                BoundarySpec::Dirichlet(v) => v,
                _ => values.as_slice()[flat],
            },
        }
    }
}

/// Rewrite edge cells according to `boundary`.
///
/// Dirichlet axes pin both edge layers to their value; Neumann axes copy
/// the interior neighbour into each edge layer; clamp and wrap leave the
/// values alone. Axes of length 1 have no interior and are skipped under
/// Neumann.
pub fn enforce_boundary(values: &mut ValueArray, boundary: &Boundary) {
    let grid = values.grid().clone();
    let data = values.as_mut_slice();
    for axis in 0..grid.ndim() {
        let stride = grid.strides()[axis];
        let len = grid.shape()[axis];
        match boundary.spec(axis) {
            BoundarySpec::Dirichlet(v) => {
                for (flat, value) in data.iter_mut().enumerate() {
                    let c = (flat / stride) % len;
                    if c == 0 || c == len - 1 {
                        *value = v;
                    }
                }
            }
            BoundarySpec::Neumann if len >= 2 => {
                for flat in 0..data.len() {
                    let c = (flat / stride) % len;
                    if c == 0 {
                        data[flat] = data[flat + stride];
                    } else if c == len - 1 {
                        data[flat] = data[flat - stride];
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(n: usize) -> Grid {
        Grid::new(&[n], &[1.0], &[0.0]).unwrap()
    }

    #[test]
    fn in_bounds_is_identity() {
        let grid = line(5);
        for spec in [
            BoundarySpec::Clamp,
            BoundarySpec::Wrap,
            BoundarySpec::Neumann,
            BoundarySpec::Dirichlet(1.0),
        ] {
            assert_eq!(resolve_index(&grid, 0, 3, spec), Some(3));
        }
    }

    #[test]
    fn clamp_saturates() {
        let grid = line(5);
        assert_eq!(resolve_index(&grid, 0, -1, BoundarySpec::Clamp), Some(0));
        assert_eq!(resolve_index(&grid, 0, 7, BoundarySpec::Clamp), Some(4));
    }

    #[test]
    fn wrap_handles_negative_offsets() {
        let grid = line(5);
        assert_eq!(resolve_index(&grid, 0, -1, BoundarySpec::Wrap), Some(4));
        assert_eq!(resolve_index(&grid, 0, -6, BoundarySpec::Wrap), Some(4));
        assert_eq!(resolve_index(&grid, 0, 5, BoundarySpec::Wrap), Some(0));
        assert_eq!(resolve_index(&grid, 0, 12, BoundarySpec::Wrap), Some(2));
    }

    #[test]
    fn dirichlet_out_of_range_is_fixed_value() {
        let grid = line(3);
        let values = ValueArray::from_vec(grid, vec![1.0, 2.0, 3.0]).unwrap();
        let b = Boundary::uniform(BoundarySpec::Dirichlet(-9.0));
        assert_eq!(b.sample(&values, 0, 0, -1), -9.0);
        assert_eq!(b.sample(&values, 2, 0, 1), -9.0);
        assert_eq!(b.sample(&values, 1, 0, 1), 3.0);
    }

    #[test]
    fn sample_walks_the_right_axis() {
        let grid = Grid::new(&[3, 3], &[1.0, 1.0], &[0.0, 0.0]).unwrap();
        let values = ValueArray::from_vec(grid, (0..9).map(f64::from).collect()).unwrap();
        let b = Boundary::uniform(BoundarySpec::Wrap);
        // Cell (1,1) = 4: axis 0 neighbours are rows, axis 1 neighbours columns.
        assert_eq!(b.sample(&values, 4, 0, 1), 7.0);
        assert_eq!(b.sample(&values, 4, 1, -1), 3.0);
        // Cell (0,0) wraps to (2,0) and (0,2).
        assert_eq!(b.sample(&values, 0, 0, -1), 6.0);
        assert_eq!(b.sample(&values, 0, 1, -1), 2.0);
    }

    #[test]
    fn enforce_dirichlet_pins_edges() {
        let grid = Grid::new(&[3, 3], &[1.0, 1.0], &[0.0, 0.0]).unwrap();
        let mut values = ValueArray::filled(grid, 5.0);
        enforce_boundary(&mut values, &Boundary::uniform(BoundarySpec::Dirichlet(0.0)));
        let data = values.as_slice();
        assert_eq!(data[4], 5.0);
        for (i, &v) in data.iter().enumerate() {
            if i != 4 {
                assert_eq!(v, 0.0, "edge cell {i} not pinned");
            }
        }
    }

    #[test]
    fn enforce_neumann_copies_interior() {
        let grid = line(4);
        let mut values = ValueArray::from_vec(grid, vec![0.0, 1.0, 2.0, 9.0]).unwrap();
        enforce_boundary(&mut values, &Boundary::uniform(BoundarySpec::Neumann));
        assert_eq!(values.as_slice(), &[1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn enforce_is_noop_for_clamp_and_wrap() {
        let grid = line(4);
        let mut values = ValueArray::from_vec(grid, vec![0.0, 1.0, 2.0, 9.0]).unwrap();
        enforce_boundary(&mut values, &Boundary::uniform(BoundarySpec::Wrap));
        enforce_boundary(&mut values, &Boundary::uniform(BoundarySpec::Clamp));
        assert_eq!(values.as_slice(), &[0.0, 1.0, 2.0, 9.0]);
    }

    #[test]
    fn boundary_deserializes_uniform_and_per_axis() {
        let b: Boundary = serde_json::from_str(r#""wrap""#).unwrap();
        assert_eq!(b.spec(3), BoundarySpec::Wrap);

        let b: Boundary = serde_json::from_str(r#"["clamp", {"dirichlet": 2.5}]"#).unwrap();
        assert_eq!(b.spec(0), BoundarySpec::Clamp);
        assert_eq!(b.spec(1), BoundarySpec::Dirichlet(2.5));
        assert!(!b.is_closed());

        let grid = Grid::new(&[2, 2, 2], &[1.0; 3], &[0.0; 3]).unwrap();
        assert!(b.check(&grid).is_err());
    }

    proptest! {
        #[test]
        fn clamp_never_leaves_range(len in 1usize..64, index in -1000isize..1000) {
            let grid = line(len);
            let r = resolve_index(&grid, 0, index, BoundarySpec::Clamp).unwrap();
            prop_assert!(r < len);
        }

        #[test]
        fn wrap_is_periodic(len in 1usize..64, index in -1000isize..1000) {
            let grid = line(len);
            let a = resolve_index(&grid, 0, index, BoundarySpec::Wrap);
            let b = resolve_index(&grid, 0, index + len as isize, BoundarySpec::Wrap);
            prop_assert_eq!(a, b);
            prop_assert!(a.unwrap() < len);
        }
    }
}
