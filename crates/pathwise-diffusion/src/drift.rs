//! The deterministic part of the diffusion velocity.

use crate::potential::Potential;
use crate::score::ScoreSchedule;

/// Source of the drift velocity `v(x, t)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Drift {
    /// `v = -∇V`.
    Potential(Potential),
    /// `v = ∇ log p_σ(t)`, the annealed Gaussian score.
    Score(ScoreSchedule),
}

impl Drift {
    /// A configured score schedule takes precedence over the potential.
    pub fn new(potential: &Potential, score: Option<ScoreSchedule>) -> Self {
        match score {
            Some(s) => Self::Score(s),
            None => Self::Potential(potential.clone()),
        }
    }

    /// Velocity at `(x, y)` during step `step` of `total`.
    pub fn velocity(&self, x: f64, y: f64, step: usize, total: usize) -> [f64; 2] {
        match self {
            Self::Potential(p) => {
                let [gx, gy] = p.gradient(x, y);
                [-gx, -gy]
            }
            Self::Score(s) => {
                let v = s.score(&[x, y], step, total);
                [v[0], v[1]]
            }
        }
    }
}
