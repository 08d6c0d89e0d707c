//! Godunov upwind finite differences.

use pathwise_core::{Boundary, ValueArray};
use smallvec::SmallVec;

/// One-sided first differences of a field at a single grid point.
#[derive(Clone, Debug, PartialEq)]
pub struct UpwindGradient {
    /// `(V[x + h·e_i] - V[x]) / h_i` per axis.
    pub forward: SmallVec<[f64; 4]>,
    /// `(V[x] - V[x - h·e_i]) / h_i` per axis.
    pub backward: SmallVec<[f64; 4]>,
}

impl UpwindGradient {
    /// The difference the characteristics select for each axis.
    ///
    /// A positive velocity carries information in from the
    /// increasing-coordinate side, so the forward difference is used;
    /// a negative velocity uses the backward one; zero contributes
    /// nothing. Axes beyond `velocity.len()` are treated as zero.
    pub fn select(&self, velocity: &[f64]) -> SmallVec<[f64; 4]> {
        (0..self.forward.len())
            .map(|i| match velocity.get(i).copied().unwrap_or(0.0) {
                v if v > 0.0 => self.forward[i],
                v if v < 0.0 => self.backward[i],
                _ => 0.0,
            })
            .collect()
    }

    /// `Σ v_i · D_i V` using the upwind difference on each axis.
    pub fn upwind_dot(&self, velocity: &[f64]) -> f64 {
        velocity
            .iter()
            .take(self.forward.len())
            .enumerate()
            .map(|(i, &v)| {
                if v > 0.0 {
                    v * self.forward[i]
                } else if v < 0.0 {
                    v * self.backward[i]
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Central difference (mean of forward and backward).
    pub fn central(&self) -> SmallVec<[f64; 4]> {
        self.forward
            .iter()
            .zip(&self.backward)
            .map(|(f, b)| 0.5 * (f + b))
            .collect()
    }
}

/// Forward and backward differences of `values` at cell `flat`.
///
/// Neighbours outside the grid are read through `boundary`, so a wrap
/// axis differences across the seam and a clamp axis yields a zero
/// one-sided difference at its edge.
///
/// # Examples
///
/// ```
/// use pathwise_core::{Boundary, BoundarySpec, Grid, ValueArray};
/// use pathwise_hjb::godunov_gradient;
///
/// let grid = Grid::new(&[3], &[0.5], &[0.0]).unwrap();
/// let v = ValueArray::from_vec(grid, vec![0.0, 1.0, 4.0]).unwrap();
/// let g = godunov_gradient(&v, 1, &Boundary::uniform(BoundarySpec::Clamp));
/// assert_eq!(g.forward[0], 6.0);
/// assert_eq!(g.backward[0], 2.0);
/// ```
pub fn godunov_gradient(values: &ValueArray, flat: usize, boundary: &Boundary) -> UpwindGradient {
    let grid = values.grid();
    let here = values.as_slice()[flat];
    let mut forward = SmallVec::with_capacity(grid.ndim());
    let mut backward = SmallVec::with_capacity(grid.ndim());
    for (axis, &h) in grid.spacing().iter().enumerate() {
        let up = boundary.sample(values, flat, axis, 1);
        let down = boundary.sample(values, flat, axis, -1);
        forward.push((up - here) / h);
        backward.push((here - down) / h);
    }
    UpwindGradient { forward, backward }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise_core::{BoundarySpec, Grid};
    use proptest::prelude::*;

    fn ramp() -> ValueArray {
        let grid = Grid::new(&[4, 4], &[1.0, 0.5], &[0.0, 0.0]).unwrap();
        ValueArray::from_fn(grid, |_, p| 2.0 * p[0] - p[1])
    }

    #[test]
    fn linear_field_has_exact_interior_differences() {
        let v = ramp();
        let flat = v.grid().flat_index(&[1, 2]).unwrap();
        let g = godunov_gradient(&v, flat, &Boundary::default());
        assert_eq!(g.forward.as_slice(), &[2.0, -1.0]);
        assert_eq!(g.backward.as_slice(), &[2.0, -1.0]);
    }

    #[test]
    fn clamp_edge_gives_zero_one_sided_difference() {
        let v = ramp();
        let g = godunov_gradient(&v, 0, &Boundary::uniform(BoundarySpec::Clamp));
        assert_eq!(g.backward.as_slice(), &[0.0, 0.0]);
        assert_eq!(g.forward.as_slice(), &[2.0, -1.0]);
    }

    #[test]
    fn select_follows_velocity_sign() {
        let g = UpwindGradient {
            forward: SmallVec::from_slice(&[1.0, 2.0, 3.0]),
            backward: SmallVec::from_slice(&[-1.0, -2.0, -3.0]),
        };
        assert_eq!(g.select(&[0.5, -0.5, 0.0]).as_slice(), &[1.0, -2.0, 0.0]);
        assert_eq!(g.upwind_dot(&[0.5, -0.5, 0.0]), 0.5 + 1.0);
        assert_eq!(g.central().as_slice(), &[0.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn select_follows_the_sign_of_the_velocity(
            axes in prop::collection::vec((-5.0f64..5.0, -5.0f64..5.0, -2.0f64..2.0), 1..5),
        ) {
            let g = UpwindGradient {
                forward: axes.iter().map(|a| a.0).collect(),
                backward: axes.iter().map(|a| a.1).collect(),
            };
            let velocity: Vec<f64> = axes.iter().map(|a| a.2).collect();
            let picked = g.select(&velocity);
            for (i, &v) in velocity.iter().enumerate() {
                let expected = if v > 0.0 {
                    g.forward[i]
                } else if v < 0.0 {
                    g.backward[i]
                } else {
                    0.0
                };
                prop_assert_eq!(picked[i], expected);
            }
            let dot: f64 = velocity.iter().zip(&picked).map(|(v, d)| v * d).sum();
            prop_assert!((g.upwind_dot(&velocity) - dot).abs() < 1e-12);
        }
    }
}
