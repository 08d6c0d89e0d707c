//! Shared fixtures for Pathwise tests and benches.
//!
//! Grids and models here are small enough to solve in milliseconds in
//! debug builds. [`fixtures`] holds ready-made gateway job configs.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use pathwise_core::Grid;
use pathwise_hjb::{QuadraticCost, SingleIntegrator};

/// `n × n` grid spanning `[-half_width, half_width]²`, both ends included.
pub fn square_grid(n: usize, half_width: f64) -> Grid {
    assert!(n >= 2, "square_grid needs at least two points per axis");
    let h = 2.0 * half_width / (n - 1) as f64;
    Grid::new(&[n, n], &[h, h], &[-half_width, -half_width]).unwrap()
}

/// Single integrator with control bound `limit` and unit quadratic cost
/// toward the origin.
pub fn lq_single_integrator(dim: usize, limit: f64) -> (SingleIntegrator, QuadraticCost) {
    (
        SingleIntegrator::new(dim, limit, 0.5).unwrap(),
        QuadraticCost::new(vec![1.0; dim], vec![1.0; dim], None).unwrap(),
    )
}

/// The linear feedback `u(x) = -x`.
pub fn pull_to_origin(x: &[f64]) -> Vec<f64> {
    x.iter().map(|v| -v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_grid_is_symmetric() {
        let grid = square_grid(5, 1.0);
        assert_eq!(grid.shape(), &[5, 5]);
        assert_eq!(grid.position(&[0, 0]), vec![-1.0, -1.0]);
        assert_eq!(grid.position(&[4, 4]), vec![1.0, 1.0]);
    }
}
