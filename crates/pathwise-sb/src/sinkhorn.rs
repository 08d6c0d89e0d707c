//! Log-domain Sinkhorn scaling for entropic optimal transport.
//!
//! Solves `min <pi, C> - eps * H(pi)` subject to `pi 1 = mu`, `pi^T 1 = nu`
//! by alternating dual updates on `log u` and `log v`:
//!
//! ```text
//! log u_i = log mu_i - LSE_j(-C_ij/eps + log v_j)
//! log v_j = log nu_j - LSE_i(-C_ij/eps + log u_i)
//! pi_ij   = exp(log u_i - C_ij/eps + log v_j)
//! ```
//!
//! Working in the log domain keeps small `eps` from underflowing the
//! Gibbs kernel. The exponent of every coupling entry is clamped to
//! `[-700, 700]` before exponentiation.
//!
//! The loop stops when the marginal error drops below `tolerance` or
//! after `max_iterations`. Running out of iterations is not an error:
//! the result reports `converged = false` and the error achieved.

use pathwise_core::CancelToken;
use serde::Serialize;

use crate::error::SinkhornError;

/// Bound on coupling exponents.
const EXP_CLAMP: f64 = 700.0;

/// Solver parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkhornConfig {
    /// Entropic regularisation strength. Must be positive.
    pub epsilon: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Marginal-error threshold for convergence.
    pub tolerance: f64,
    /// Optional initial duals.
    pub warm_start: Option<WarmStart>,
}

impl Default for SinkhornConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            max_iterations: 500,
            tolerance: 1e-3,
            warm_start: None,
        }
    }
}

impl SinkhornConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), SinkhornError> {
        let bad = |reason: String| Err(SinkhornError::InvalidConfig { reason });
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return bad(format!("epsilon must be positive, got {}", self.epsilon));
        }
        if self.max_iterations == 0 {
            return bad("max_iterations must be at least 1".into());
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return bad(format!("tolerance must be positive, got {}", self.tolerance));
        }
        Ok(())
    }
}

/// Initial dual potentials, e.g. from a previous solve.
#[derive(Clone, Debug, PartialEq)]
pub struct WarmStart {
    /// `log u`, one entry per source point.
    pub log_u: Vec<f64>,
    /// `log v`, one entry per target point.
    pub log_v: Vec<f64>,
}

/// Marginal error after one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// `max(L1(row sums - mu), L1(col sums - nu))`.
    pub marginal_error: f64,
}

/// Summary statistics of the final coupling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// `sum_ij pi_ij C_ij`.
    pub transport_cost: f64,
    /// `-sum_ij pi_ij ln pi_ij` over positive entries.
    pub entropy: f64,
    /// Final marginal error.
    pub marginal_error: f64,
}

/// Output of [`log_sinkhorn`].
#[derive(Clone, Debug, PartialEq)]
pub struct SinkhornResult {
    /// Final `log u`.
    pub log_u: Vec<f64>,
    /// Final `log v`.
    pub log_v: Vec<f64>,
    /// Dense row-major coupling.
    pub coupling: Vec<f64>,
    /// Source count.
    pub rows: usize,
    /// Target count.
    pub cols: usize,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the marginal error fell below tolerance.
    pub converged: bool,
    /// Final marginal error.
    pub marginal_error: f64,
    /// One record per iteration.
    pub history: Vec<IterationRecord>,
    /// Cost and entropy of the final coupling.
    pub diagnostics: Diagnostics,
}

/// `ln max(w, f64::EPSILON)`, so zero-weight points stay finite.
fn safe_ln(w: f64) -> f64 {
    w.max(f64::EPSILON).ln()
}

/// Log-sum-exp over an iterator of exponents.
fn log_sum_exp(terms: impl Iterator<Item = f64> + Clone) -> f64 {
    let max = terms.clone().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + terms.map(|t| (t - max).exp()).sum::<f64>().ln()
}

struct Kernel<'a> {
    log_k: Vec<f64>,
    cost: &'a [f64],
    rows: usize,
    cols: usize,
}

impl Kernel<'_> {
    #[inline]
    fn entry(&self, log_u: &[f64], log_v: &[f64], i: usize, j: usize) -> f64 {
        (log_u[i] + self.log_k[i * self.cols + j] + log_v[j])
            .clamp(-EXP_CLAMP, EXP_CLAMP)
            .exp()
    }

    fn marginal_error(&self, log_u: &[f64], log_v: &[f64], mu: &[f64], nu: &[f64]) -> f64 {
        let mut col_sums = vec![0.0; self.cols];
        let mut row_err = 0.0;
        for i in 0..self.rows {
            let mut row = 0.0;
            for (j, col) in col_sums.iter_mut().enumerate() {
                let p = self.entry(log_u, log_v, i, j);
                row += p;
                *col += p;
            }
            row_err += (row - mu[i]).abs();
        }
        let col_err: f64 = col_sums.iter().zip(nu).map(|(c, n)| (c - n).abs()).sum();
        row_err.max(col_err)
    }

    fn coupling(&self, log_u: &[f64], log_v: &[f64]) -> Vec<f64> {
        let mut pi = Vec::with_capacity(self.rows * self.cols);
        for i in 0..self.rows {
            pi.extend((0..self.cols).map(|j| self.entry(log_u, log_v, i, j)));
        }
        pi
    }

    fn diagnostics(&self, coupling: &[f64], marginal_error: f64) -> Diagnostics {
        let mut transport_cost = 0.0;
        let mut entropy = 0.0;
        for (p, c) in coupling.iter().zip(self.cost) {
            transport_cost += p * c;
            if *p > 0.0 {
                entropy -= p * p.ln();
            }
        }
        Diagnostics {
            transport_cost,
            entropy,
            marginal_error,
        }
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), SinkhornError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SinkhornError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Run log-domain Sinkhorn on a dense `rows x cols` cost matrix.
///
/// `mu` and `nu` should each sum to one; the marginal error is measured
/// against them as given. The cancel token is polled once per iteration.
pub fn log_sinkhorn(
    mu: &[f64],
    nu: &[f64],
    cost: &[f64],
    rows: usize,
    cols: usize,
    config: &SinkhornConfig,
    cancel: &CancelToken,
) -> Result<SinkhornResult, SinkhornError> {
    config.validate()?;
    if rows == 0 || cols == 0 {
        return Err(SinkhornError::InvalidConfig {
            reason: "coupling must have at least one row and one column".into(),
        });
    }
    check_len("source weights", rows, mu.len())?;
    check_len("target weights", cols, nu.len())?;
    check_len("cost matrix entries", rows * cols, cost.len())?;

    let (mut log_u, mut log_v) = match &config.warm_start {
        Some(w) => {
            check_len("warm-start log_u", rows, w.log_u.len())?;
            check_len("warm-start log_v", cols, w.log_v.len())?;
            (w.log_u.clone(), w.log_v.clone())
        }
        None => (vec![0.0; rows], vec![0.0; cols]),
    };

    let kernel = Kernel {
        log_k: cost.iter().map(|c| -c / config.epsilon).collect(),
        cost,
        rows,
        cols,
    };
    let log_mu: Vec<f64> = mu.iter().map(|&w| safe_ln(w)).collect();
    let log_nu: Vec<f64> = nu.iter().map(|&w| safe_ln(w)).collect();

    let mut history = Vec::new();
    let mut marginal_error = f64::INFINITY;
    let mut converged = false;

    for iteration in 0..config.max_iterations {
        if cancel.is_cancelled() {
            return Err(SinkhornError::Cancelled);
        }

        for i in 0..rows {
            let row = &kernel.log_k[i * cols..(i + 1) * cols];
            log_u[i] = log_mu[i] - log_sum_exp(row.iter().zip(&log_v).map(|(k, v)| k + v));
        }
        for j in 0..cols {
            let column = (0..rows).map(|i| kernel.log_k[i * cols + j] + log_u[i]);
            log_v[j] = log_nu[j] - log_sum_exp(column);
        }
        if log_u.iter().chain(&log_v).any(|x| !x.is_finite()) {
            return Err(SinkhornError::NonFinite { iteration });
        }

        marginal_error = kernel.marginal_error(&log_u, &log_v, mu, nu);
        history.push(IterationRecord {
            iteration,
            marginal_error,
        });
        if marginal_error < config.tolerance {
            converged = true;
            break;
        }
    }

    let coupling = kernel.coupling(&log_u, &log_v);
    let diagnostics = kernel.diagnostics(&coupling, marginal_error);
    tracing::debug!(
        rows,
        cols,
        iterations = history.len(),
        marginal_error,
        converged,
        "sinkhorn finished"
    );

    Ok(SinkhornResult {
        log_u,
        log_v,
        coupling,
        rows,
        cols,
        iterations: history.len(),
        converged,
        marginal_error,
        history,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{cost_matrix, CostMetric};
    use crate::marginal::Marginal;
    use proptest::prelude::*;

    fn solve(src: &str, dst: &str, config: &SinkhornConfig) -> SinkhornResult {
        let mu = Marginal::parse(src).unwrap();
        let nu = Marginal::parse(dst).unwrap();
        let cost = cost_matrix(&mu, &nu, CostMetric::L2).unwrap();
        log_sinkhorn(
            mu.weights(),
            nu.weights(),
            &cost,
            mu.len(),
            nu.len(),
            config,
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn separated_gaussians_converge_at_small_epsilon() {
        let r = solve(
            "gaussian:-2,0:0.3:32",
            "gaussian:2,0:0.3:32",
            &SinkhornConfig::default(),
        );
        assert!(r.converged, "marginal error {}", r.marginal_error);
        assert!(r.marginal_error < 1e-3);
        assert!(r.iterations > 0 && r.iterations < 500);
        assert_eq!(r.history.len(), r.iterations);
        assert_eq!(r.history.last().unwrap().marginal_error, r.marginal_error);
        assert_eq!(r.diagnostics.marginal_error, r.marginal_error);
        // Every pair is at least ~4 apart in x.
        assert!(r.diagnostics.transport_cost > 9.0);
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let config = SinkhornConfig::default();
        let a = solve("gaussian:-2,0:0.3:32", "gaussian:2,0:0.3:32", &config);
        let b = solve("gaussian:-2,0:0.3:32", "gaussian:2,0:0.3:32", &config);
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.marginal_error.to_bits(), b.marginal_error.to_bits());
        assert_eq!(a.coupling, b.coupling);
    }

    #[test]
    fn iteration_cap_is_not_an_error() {
        let config = SinkhornConfig {
            max_iterations: 1,
            tolerance: 1e-14,
            ..SinkhornConfig::default()
        };
        let r = solve("gaussian:-2,0:0.5:24", "gaussian:2,0:0.5:24", &config);
        assert!(!r.converged);
        assert_eq!(r.iterations, 1);
        assert!(r.marginal_error.is_finite());
    }

    #[test]
    fn warm_start_from_converged_duals_finishes_immediately() {
        let config = SinkhornConfig::default();
        let cold = solve("gaussian:-1:0.4:16", "gaussian:1:0.4:16", &config);
        let warm = solve(
            "gaussian:-1:0.4:16",
            "gaussian:1:0.4:16",
            &SinkhornConfig {
                warm_start: Some(WarmStart {
                    log_u: cold.log_u.clone(),
                    log_v: cold.log_v.clone(),
                }),
                ..config
            },
        );
        assert!(warm.converged);
        assert_eq!(warm.iterations, 1);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let token = CancelToken::new();
        let good = SinkhornConfig::default();
        let zero_eps = SinkhornConfig {
            epsilon: 0.0,
            ..SinkhornConfig::default()
        };
        assert!(matches!(
            log_sinkhorn(&[1.0], &[1.0], &[0.0], 1, 1, &zero_eps, &token),
            Err(SinkhornError::InvalidConfig { .. })
        ));
        assert!(matches!(
            log_sinkhorn(&[1.0], &[0.5, 0.5], &[0.0], 1, 2, &good, &token),
            Err(SinkhornError::DimensionMismatch { .. })
        ));
        let bad_warm = SinkhornConfig {
            warm_start: Some(WarmStart {
                log_u: vec![0.0; 3],
                log_v: vec![0.0],
            }),
            ..SinkhornConfig::default()
        };
        assert!(matches!(
            log_sinkhorn(&[1.0], &[1.0], &[0.0], 1, 1, &bad_warm, &token),
            Err(SinkhornError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn cancelled_before_first_iteration() {
        let token = CancelToken::new();
        token.cancel();
        let r = log_sinkhorn(
            &[1.0],
            &[1.0],
            &[0.0],
            1,
            1,
            &SinkhornConfig::default(),
            &token,
        );
        assert_eq!(r, Err(SinkhornError::Cancelled));
    }

    #[test]
    fn infinite_cost_is_non_finite() {
        let r = log_sinkhorn(
            &[1.0],
            &[1.0],
            &[f64::INFINITY],
            1,
            1,
            &SinkhornConfig::default(),
            &CancelToken::new(),
        );
        assert_eq!(r, Err(SinkhornError::NonFinite { iteration: 0 }));
    }

    proptest! {
        #[test]
        fn coupling_is_non_negative_with_unit_mass(
            xs in prop::collection::vec(-3.0f64..3.0, 2..8),
            ys in prop::collection::vec(-3.0f64..3.0, 2..8),
        ) {
            let n = xs.len();
            let m = ys.len();
            let mu = vec![1.0 / n as f64; n];
            let nu = vec![1.0 / m as f64; m];
            let cost: Vec<f64> = xs
                .iter()
                .flat_map(|x| ys.iter().map(move |y| (x - y) * (x - y)))
                .collect();
            let config = SinkhornConfig { epsilon: 1.0, ..SinkhornConfig::default() };
            let r = log_sinkhorn(&mu, &nu, &cost, n, m, &config, &CancelToken::new()).unwrap();
            prop_assert!(r.coupling.iter().all(|p| *p >= 0.0));
            let total: f64 = r.coupling.iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-2);
        }
    }
}
