//! Annealed Gaussian score.

use crate::error::DiffusionError;
use serde::{Deserialize, Serialize};

/// `σ(τ) = start · (end / start)^τ` with `τ = t / total` (0 when
/// `total == 0`).
pub fn annealed_sigma(start_sigma: f64, end_sigma: f64, t: usize, total: usize) -> f64 {
    let tau = if total == 0 {
        0.0
    } else {
        t as f64 / total as f64
    };
    start_sigma * (end_sigma / start_sigma).powf(tau)
}

/// Score of an isotropic Gaussian of width [`annealed_sigma`]:
/// `∇ log p(x) = -x / σ²`, component-wise.
///
/// # Examples
///
/// ```
/// use pathwise_diffusion::annealed_score;
///
/// // At t = 0 the width is the start sigma.
/// assert_eq!(annealed_score(&[2.0, -1.0], 1.0, 0.1, 0, 10), vec![-2.0, 1.0]);
/// ```
pub fn annealed_score(
    x: &[f64],
    start_sigma: f64,
    end_sigma: f64,
    t: usize,
    total: usize,
) -> Vec<f64> {
    let sigma = annealed_sigma(start_sigma, end_sigma, t, total);
    let inv = 1.0 / (sigma * sigma);
    x.iter().map(|v| -v * inv).collect()
}

/// Endpoints of a geometric noise anneal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSchedule {
    /// Width at the first step.
    pub start_sigma: f64,
    /// Width at the last step.
    pub end_sigma: f64,
}

impl ScoreSchedule {
    /// Both widths must be finite and positive.
    pub fn validate(&self) -> Result<(), DiffusionError> {
        for (name, v) in [("startSigma", self.start_sigma), ("endSigma", self.end_sigma)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(DiffusionError::invalid(format!(
                    "{name} must be finite and positive, got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Score at `x` for step `t` of `total`.
    pub fn score(&self, x: &[f64], t: usize, total: usize) -> Vec<f64> {
        annealed_score(x, self.start_sigma, self.end_sigma, t, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn endpoints_match_configuration() {
        assert_eq!(annealed_sigma(2.0, 0.5, 0, 10), 2.0);
        assert!((annealed_sigma(2.0, 0.5, 10, 10) - 0.5).abs() < 1e-12);
        assert!((annealed_sigma(2.0, 0.5, 5, 10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_uses_start() {
        assert_eq!(annealed_sigma(3.0, 1.0, 7, 0), 3.0);
    }

    #[test]
    fn curvature_grows_as_sigma_shrinks() {
        let early = annealed_score(&[1.0], 1.0, 0.1, 0, 10)[0];
        let late = annealed_score(&[1.0], 1.0, 0.1, 10, 10)[0];
        assert!(late < early);
    }

    #[test]
    fn schedule_rejects_non_positive_sigma() {
        let s = ScoreSchedule {
            start_sigma: 0.0,
            end_sigma: 1.0,
        };
        assert!(s.validate().is_err());
    }

    proptest! {
        #[test]
        fn sigma_stays_between_endpoints(
            a in 0.01f64..10.0, b in 0.01f64..10.0, t in 0usize..100, total in 1usize..100
        ) {
            let t = t.min(total);
            let s = annealed_sigma(a, b, t, total);
            prop_assert!(s >= a.min(b) * (1.0 - 1e-12));
            prop_assert!(s <= a.max(b) * (1.0 + 1e-12));
        }
    }
}
