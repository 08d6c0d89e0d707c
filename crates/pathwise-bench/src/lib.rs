//! Benchmark profiles for the Pathwise solvers.
//!
//! - [`lq_profile`]: `n × n` LQ control problem over `[-2, 2]²`
//! - [`fp_profile`]: double-well Fokker-Planck run
//! - [`sb_profile`]: two separated Gaussian clouds of `n` points

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use pathwise_core::{Grid, GridError};
use pathwise_diffusion::FokkerPlanckConfig;
use pathwise_hjb::{HjbError, QuadraticCost, SingleIntegrator};
use pathwise_sb::{Marginal, SinkhornError};

/// An LQ problem on an `n × n` grid.
pub struct LqProfile {
    /// State grid.
    pub grid: Grid,
    /// Bounded single integrator, limit 2.
    pub dynamics: SingleIntegrator,
    /// Unit quadratic cost to the origin.
    pub cost: QuadraticCost,
}

/// Errors building a profile.
#[derive(Debug)]
pub enum ProfileError {
    /// Grid construction failed.
    Grid(GridError),
    /// Model construction failed.
    Hjb(HjbError),
    /// Marginal construction failed.
    Sinkhorn(SinkhornError),
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grid(e) => write!(f, "profile grid: {e}"),
            Self::Hjb(e) => write!(f, "profile model: {e}"),
            Self::Sinkhorn(e) => write!(f, "profile marginal: {e}"),
        }
    }
}

impl std::error::Error for ProfileError {}

/// `n × n` LQ problem; `n` must be at least 2.
pub fn lq_profile(n: usize) -> Result<LqProfile, ProfileError> {
    let h = 4.0 / (n.max(2) - 1) as f64;
    Ok(LqProfile {
        grid: Grid::new(&[n, n], &[h, h], &[-2.0, -2.0]).map_err(ProfileError::Grid)?,
        dynamics: SingleIntegrator::new(2, 2.0, 0.5).map_err(ProfileError::Hjb)?,
        cost: QuadraticCost::new(vec![1.0, 1.0], vec![1.0, 1.0], None)
            .map_err(ProfileError::Hjb)?,
    })
}

/// Double-well Fokker-Planck run on an `n × n` grid.
pub fn fp_profile(n: usize, steps: usize) -> FokkerPlanckConfig {
    FokkerPlanckConfig {
        grid: [n, n],
        steps,
        dt: 0.01,
        seed: 11,
        ..FokkerPlanckConfig::default()
    }
}

/// Gaussian clouds centred at `(-2, 0)` and `(2, 0)`, `n` points each.
pub fn sb_profile(n: usize) -> Result<(Marginal, Marginal), ProfileError> {
    let mu = Marginal::parse(&format!("gaussian:-2,0:0.3:{n}")).map_err(ProfileError::Sinkhorn)?;
    let nu = Marginal::parse(&format!("gaussian:2,0:0.3:{n}")).map_err(ProfileError::Sinkhorn)?;
    Ok((mu, nu))
}
