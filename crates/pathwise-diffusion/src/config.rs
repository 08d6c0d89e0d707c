//! Run configurations for the two diffusion solvers.
//!
//! Both deserialize from the camelCase JSON accepted at the API boundary,
//! fill unset fields with defaults, and must pass `validate()` before a
//! run starts.

use crate::error::DiffusionError;
use crate::potential::Potential;
use crate::schedule::BetaSchedule;
use crate::score::ScoreSchedule;
use pathwise_core::{Boundary, BoundarySpec, Grid};
use serde::{Deserialize, Serialize};

/// Half-width of the square domain when unset.
pub const DEFAULT_DOMAIN: f64 = 2.5;

fn check_common(
    grid: [usize; 2],
    domain: f64,
    steps: usize,
    dt: f64,
    score: Option<&ScoreSchedule>,
) -> Result<(), DiffusionError> {
    if grid.contains(&0) {
        return Err(DiffusionError::invalid(format!(
            "grid must be at least 1x1, got {}x{}",
            grid[0], grid[1]
        )));
    }
    if !domain.is_finite() || domain <= 0.0 {
        return Err(DiffusionError::invalid(format!(
            "domain must be finite and positive, got {domain}"
        )));
    }
    if steps == 0 {
        return Err(DiffusionError::invalid("steps must be at least 1"));
    }
    if !dt.is_finite() || dt <= 0.0 {
        return Err(DiffusionError::invalid(format!(
            "dt must be finite and positive, got {dt}"
        )));
    }
    if let Some(s) = score {
        s.validate()?;
    }
    Ok(())
}

/// Snapshot cadence shared by both solvers: `max(1, steps / 100)`.
pub(crate) fn record_every(steps: usize) -> usize {
    (steps / 100).max(1)
}

/// Fokker-Planck run parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FokkerPlanckConfig {
    /// Cells along `x` and `y`.
    pub grid: [usize; 2],
    /// Half-width of the square domain `[-domain, domain]²`.
    pub domain: f64,
    /// Potential generating the drift.
    pub potential: Potential,
    /// Diffusion-coefficient schedule.
    #[serde(alias = "betaSchedule")]
    pub beta: BetaSchedule,
    /// Annealed score drift; replaces the potential when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreSchedule>,
    /// Outer steps.
    pub steps: usize,
    /// Outer step size.
    pub dt: f64,
    /// Edge policy on both axes.
    pub boundary: Boundary,
    /// Recorded with the run; the density evolution itself is deterministic.
    pub seed: u32,
}

impl Default for FokkerPlanckConfig {
    fn default() -> Self {
        Self {
            grid: [64, 64],
            domain: DEFAULT_DOMAIN,
            potential: Potential::DoubleWell,
            beta: BetaSchedule::default(),
            score: None,
            steps: 400,
            dt: 0.005,
            boundary: Boundary::uniform(BoundarySpec::Neumann),
            seed: 7,
        }
    }
}

impl FokkerPlanckConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), DiffusionError> {
        check_common(
            self.grid,
            self.domain,
            self.steps,
            self.dt,
            self.score.as_ref(),
        )?;
        let grid = self.build_grid()?;
        self.boundary.check(&grid)?;
        Ok(())
    }

    /// The cell-centred grid the density lives on.
    pub fn build_grid(&self) -> Result<Grid, DiffusionError> {
        Ok(Grid::centered_2d(self.grid[0], self.grid[1], self.domain)?)
    }

    /// Number of grid cells.
    pub fn cells(&self) -> usize {
        self.grid[0].saturating_mul(self.grid[1])
    }
}

/// Euler-Maruyama particle run parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdeConfig {
    /// Histogram cells along `x` and `y`.
    pub grid: [usize; 2],
    /// Half-width of the histogram domain.
    pub domain: f64,
    /// Potential generating the drift.
    pub potential: Potential,
    /// Diffusion-coefficient schedule.
    #[serde(alias = "betaSchedule")]
    pub beta: BetaSchedule,
    /// Annealed score drift; replaces the potential when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreSchedule>,
    /// Time steps.
    pub steps: usize,
    /// Step size.
    pub dt: f64,
    /// Number of particles.
    pub particles: usize,
    /// Seed of the particle noise.
    pub seed: u32,
}

impl Default for SdeConfig {
    fn default() -> Self {
        Self {
            grid: [64, 64],
            domain: DEFAULT_DOMAIN,
            potential: Potential::DoubleWell,
            beta: BetaSchedule::default(),
            score: None,
            steps: 2000,
            dt: 0.01,
            particles: 2000,
            seed: 7,
        }
    }
}

impl SdeConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), DiffusionError> {
        check_common(
            self.grid,
            self.domain,
            self.steps,
            self.dt,
            self.score.as_ref(),
        )?;
        if self.particles == 0 {
            return Err(DiffusionError::invalid("particles must be at least 1"));
        }
        Ok(())
    }

    /// The histogram grid.
    pub fn build_grid(&self) -> Result<Grid, DiffusionError> {
        Ok(Grid::centered_2d(self.grid[0], self.grid[1], self.domain)?)
    }

    /// Number of histogram cells.
    pub fn cells(&self) -> usize {
        self.grid[0].saturating_mul(self.grid[1])
    }
}
