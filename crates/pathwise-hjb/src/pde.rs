//! Stationary and finite-horizon HJB solvers on a grid.
//!
//! Both solvers discretise `H(x, ∇V) = min_u [L(x,u) + f(x,u)·∇V]` with
//! the Godunov upwind gradient and march explicitly:
//!
//! | Mode           | Update                  | Step bound                              |
//! |----------------|-------------------------|-----------------------------------------|
//! | stationary     | `V ← V + Δτ (H - λV)`   | `Δτ = damping / (λ + max Σ abs(f)/h)`   |
//! | time-dependent | `V ← V + Δt H`, `V(T)=0` | sub-stepped to `Δt · max Σ abs(f)/h ≤ 0.9` |
//!
//! Boundary values are enforced before every sweep. Cancellation is
//! checked once per iteration.

use crate::cost::CostModel;
use crate::dynamics::{enumerate_controls, Dynamics};
use crate::error::HjbError;
use crate::gradient::godunov_gradient;
use crate::hamiltonian::hamiltonian;
use pathwise_core::{enforce_boundary, Boundary, CancelToken, Grid, ValueArray};

/// Courant number used to sub-step the time-dependent sweep.
const COURANT: f64 = 0.9;

/// Output of either HJB solver.
#[derive(Debug, PartialEq)]
pub struct HjbSolution {
    /// Value function on the grid.
    pub value: ValueArray,
    /// Minimising control at each grid point, in flat order.
    pub policy: Vec<Vec<f64>>,
    /// Sweeps performed (outer steps for the time-dependent solver).
    pub iterations: usize,
    /// Final `max |ΔV| / Δτ`.
    pub residual: f64,
    /// Whether the residual fell below tolerance (stationary) or the
    /// horizon was fully swept (time-dependent).
    pub converged: bool,
}

/// Parameters of [`solve_stationary`].
#[derive(Clone, Debug, PartialEq)]
pub struct StationaryOptions {
    /// Discount rate `λ > 0`.
    pub discount: f64,
    /// Residual threshold.
    pub tolerance: f64,
    /// Pseudo-time step scale in `(0, 1]`.
    pub damping: f64,
    /// Sweep budget.
    pub max_iterations: usize,
    /// Edge policy.
    pub boundary: Boundary,
    /// Control lattice spacing; the model default when `None`.
    pub control_resolution: Option<f64>,
}

impl Default for StationaryOptions {
    fn default() -> Self {
        Self {
            discount: 1.0,
            tolerance: 1e-4,
            damping: 0.9,
            max_iterations: 5000,
            boundary: Boundary::default(),
            control_resolution: None,
        }
    }
}

impl StationaryOptions {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), HjbError> {
        if !self.discount.is_finite() || self.discount <= 0.0 {
            return Err(HjbError::invalid(format!(
                "discount must be finite and positive, got {}",
                self.discount
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(HjbError::invalid(format!(
                "tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(HjbError::invalid(format!(
                "damping must lie in (0, 1], got {}",
                self.damping
            )));
        }
        if self.max_iterations == 0 {
            return Err(HjbError::invalid("maxIterations must be at least 1"));
        }
        Ok(())
    }
}

/// Parameters of [`solve_time_dependent`].
#[derive(Clone, Debug, PartialEq)]
pub struct TimeDependentOptions {
    /// Horizon `T > 0`.
    pub horizon: f64,
    /// Outer time step.
    pub time_step: f64,
    /// Early-exit threshold on `max |ΔV| / Δt`.
    pub tolerance: f64,
    /// Edge policy.
    pub boundary: Boundary,
    /// Control lattice spacing; the model default when `None`.
    pub control_resolution: Option<f64>,
}

impl Default for TimeDependentOptions {
    fn default() -> Self {
        Self {
            horizon: 1.0,
            time_step: 0.05,
            tolerance: 1e-4,
            boundary: Boundary::default(),
            control_resolution: None,
        }
    }
}

impl TimeDependentOptions {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), HjbError> {
        for (name, v) in [
            ("horizon", self.horizon),
            ("timeStep", self.time_step),
            ("tolerance", self.tolerance),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(HjbError::invalid(format!(
                    "{name} must be finite and positive, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Precomputed per-solve context shared by both marching schemes.
struct Sweep<'a> {
    dynamics: &'a dyn Dynamics,
    cost: &'a dyn CostModel,
    boundary: &'a Boundary,
    controls: Vec<Vec<f64>>,
    positions: Vec<Vec<f64>>,
}

impl<'a> Sweep<'a> {
    fn new(
        grid: &Grid,
        dynamics: &'a dyn Dynamics,
        cost: &'a dyn CostModel,
        boundary: &'a Boundary,
        control_resolution: Option<f64>,
    ) -> Result<Self, HjbError> {
        if dynamics.state_dim() != grid.ndim() {
            return Err(HjbError::DimensionMismatch {
                what: "grid",
                expected: dynamics.state_dim(),
                actual: grid.ndim(),
            });
        }
        boundary.check(grid)?;
        let mut positions = Vec::with_capacity(grid.len());
        grid.for_each(|_, _, p| positions.push(p.to_vec()));
        Ok(Self {
            dynamics,
            cost,
            boundary,
            controls: enumerate_controls(dynamics, control_resolution),
            positions,
        })
    }

    /// `max_x max_u Σ |f_i(x,u)| / h_i`.
    fn max_rate(&self, grid: &Grid) -> f64 {
        let mut max = 0.0_f64;
        for x in &self.positions {
            for u in &self.controls {
                let r: f64 = self
                    .dynamics
                    .rate(x, u)
                    .iter()
                    .zip(grid.spacing())
                    .map(|(f, h)| f.abs() / h)
                    .sum();
                max = max.max(r);
            }
        }
        max
    }

    fn hamiltonian_field(&self, values: &ValueArray, out: &mut [f64]) {
        for (flat, slot) in out.iter_mut().enumerate() {
            let g = godunov_gradient(values, flat, self.boundary);
            *slot = hamiltonian(
                &self.positions[flat],
                &g,
                self.dynamics,
                self.cost,
                &self.controls,
            )
            .0;
        }
    }

    fn policy(&self, values: &ValueArray) -> Vec<Vec<f64>> {
        (0..self.positions.len())
            .map(|flat| {
                let g = godunov_gradient(values, flat, self.boundary);
                let (_, i) = hamiltonian(
                    &self.positions[flat],
                    &g,
                    self.dynamics,
                    self.cost,
                    &self.controls,
                );
                self.dynamics.clip(&self.controls[i])
            })
            .collect()
    }
}

/// Solve the discounted infinite-horizon HJB equation
/// `λV = min_u [L + f·∇V]` by pseudo-time marching from `V = 0`.
///
/// Hitting `max_iterations` is reported through
/// [`HjbSolution::converged`], not as an error. A non-finite value at any
/// sweep is fatal.
pub fn solve_stationary(
    grid: &Grid,
    dynamics: &dyn Dynamics,
    cost: &dyn CostModel,
    options: &StationaryOptions,
    cancel: &CancelToken,
) -> Result<HjbSolution, HjbError> {
    options.validate()?;
    let sweep = Sweep::new(
        grid,
        dynamics,
        cost,
        &options.boundary,
        options.control_resolution,
    )?;
    let lambda = options.discount;
    let dtau = options.damping / (lambda + sweep.max_rate(grid));

    let mut value = ValueArray::zeros(grid.clone());
    enforce_boundary(&mut value, &options.boundary);
    let mut next = ValueArray::zeros(grid.clone());
    let mut h = vec![0.0; grid.len()];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        if cancel.is_cancelled() {
            return Err(HjbError::Cancelled);
        }
        sweep.hamiltonian_field(&value, &mut h);
        for ((n, &v), &hv) in next.as_mut_slice().iter_mut().zip(value.as_slice()).zip(&h) {
            *n = v + dtau * (hv - lambda * v);
        }
        enforce_boundary(&mut next, &options.boundary);
        iterations += 1;
        if next.first_non_finite().is_some() {
            return Err(HjbError::NonFinite {
                step: iterations,
                what: "value",
            });
        }
        residual = next.max_abs_diff(&value) / dtau;
        std::mem::swap(&mut value, &mut next);
        if residual < options.tolerance {
            converged = true;
            break;
        }
    }

    let policy = sweep.policy(&value);
    tracing::debug!(
        iterations,
        residual,
        converged,
        dynamics = dynamics.name(),
        "stationary HJB solve finished"
    );
    Ok(HjbSolution {
        value,
        policy,
        iterations,
        residual,
        converged,
    })
}

/// Solve the finite-horizon HJB equation backwards from `V(T) = 0`.
///
/// The horizon is split into `ceil(T / time_step)` equal outer steps,
/// each sub-cycled to satisfy the upwind CFL bound. Sweeping stops early
/// once the value stops changing (`max |ΔV| / Δt < tolerance`).
pub fn solve_time_dependent(
    grid: &Grid,
    dynamics: &dyn Dynamics,
    cost: &dyn CostModel,
    options: &TimeDependentOptions,
    cancel: &CancelToken,
) -> Result<HjbSolution, HjbError> {
    options.validate()?;
    let sweep = Sweep::new(
        grid,
        dynamics,
        cost,
        &options.boundary,
        options.control_resolution,
    )?;
    let steps = ((options.horizon / options.time_step).ceil() as usize).max(1);
    let dt = options.horizon / steps as f64;
    let substeps = ((dt * sweep.max_rate(grid) / COURANT).ceil() as usize).max(1);
    let dt_sub = dt / substeps as f64;

    let mut value = ValueArray::zeros(grid.clone());
    enforce_boundary(&mut value, &options.boundary);
    let mut next = ValueArray::zeros(grid.clone());
    let mut h = vec![0.0; grid.len()];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;

    'outer: while iterations < steps {
        if cancel.is_cancelled() {
            return Err(HjbError::Cancelled);
        }
        iterations += 1;
        for _ in 0..substeps {
            sweep.hamiltonian_field(&value, &mut h);
            for ((n, &v), &hv) in next.as_mut_slice().iter_mut().zip(value.as_slice()).zip(&h) {
                *n = v + dt_sub * hv;
            }
            enforce_boundary(&mut next, &options.boundary);
            if next.first_non_finite().is_some() {
                return Err(HjbError::NonFinite {
                    step: iterations,
                    what: "value",
                });
            }
            residual = next.max_abs_diff(&value) / dt_sub;
            std::mem::swap(&mut value, &mut next);
            if residual < options.tolerance {
                break 'outer;
            }
        }
    }

    let policy = sweep.policy(&value);
    tracing::debug!(
        iterations,
        substeps,
        residual,
        dynamics = dynamics.name(),
        "time-dependent HJB solve finished"
    );
    Ok(HjbSolution {
        value,
        policy,
        iterations,
        residual,
        converged: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::QuadraticCost;
    use crate::dynamics::SingleIntegrator;
    use pathwise_core::BoundarySpec;

    fn line() -> Grid {
        Grid::new(&[21], &[0.1], &[-1.0]).unwrap()
    }

    fn lq() -> (SingleIntegrator, QuadraticCost) {
        (
            SingleIntegrator::new(1, 1.0, 0.5).unwrap(),
            QuadraticCost::new(vec![1.0], vec![1.0], None).unwrap(),
        )
    }

    #[test]
    fn stationary_lq_converges_to_bowl() {
        let (dynamics, cost) = lq();
        let grid = line();
        let sol = solve_stationary(
            &grid,
            &dynamics,
            &cost,
            &StationaryOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(sol.converged, "residual {}", sol.residual);
        assert!(sol.residual < 1e-4);

        let v = sol.value.as_slice();
        assert!(v[10].abs() < 1e-9);
        assert!(v.iter().all(|&x| x >= -1e-12));
        assert!(v[15] > v[12] && v[12] > v[10]);
        for k in 0..10 {
            assert!((v[k] - v[20 - k]).abs() < 1e-6, "asymmetry at {k}");
        }

        // x = 0.8 and x = -0.8: steer back toward the origin.
        assert!(sol.policy[18][0] < 0.0);
        assert!(sol.policy[2][0] > 0.0);
    }

    #[test]
    fn iteration_budget_is_not_an_error() {
        let (dynamics, cost) = lq();
        let options = StationaryOptions {
            max_iterations: 3,
            ..StationaryOptions::default()
        };
        let sol =
            solve_stationary(&line(), &dynamics, &cost, &options, &CancelToken::new()).unwrap();
        assert_eq!(sol.iterations, 3);
        assert!(!sol.converged);
    }

    #[test]
    fn dirichlet_edges_stay_pinned() {
        let (dynamics, cost) = lq();
        let options = StationaryOptions {
            boundary: Boundary::uniform(BoundarySpec::Dirichlet(0.25)),
            ..StationaryOptions::default()
        };
        let sol =
            solve_stationary(&line(), &dynamics, &cost, &options, &CancelToken::new()).unwrap();
        assert_eq!(sol.value.as_slice()[0], 0.25);
        assert_eq!(sol.value.as_slice()[20], 0.25);
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let dynamics = SingleIntegrator::new(2, 1.0, 0.5).unwrap();
        let cost = QuadraticCost::new(vec![1.0], vec![1.0], None).unwrap();
        let err = solve_stationary(
            &line(),
            &dynamics,
            &cost,
            &StationaryOptions::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, HjbError::DimensionMismatch { .. }));
    }

    #[test]
    fn invalid_options_rejected() {
        let (dynamics, cost) = lq();
        for options in [
            StationaryOptions {
                discount: 0.0,
                ..StationaryOptions::default()
            },
            StationaryOptions {
                damping: 1.5,
                ..StationaryOptions::default()
            },
            StationaryOptions {
                tolerance: f64::NAN,
                ..StationaryOptions::default()
            },
        ] {
            let err = solve_stationary(&line(), &dynamics, &cost, &options, &CancelToken::new())
                .unwrap_err();
            assert!(matches!(err, HjbError::InvalidConfig { .. }));
        }
    }

    #[test]
    fn cancelled_token_stops_solve() {
        let (dynamics, cost) = lq();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = solve_stationary(
            &line(),
            &dynamics,
            &cost,
            &StationaryOptions::default(),
            &cancel,
        )
        .unwrap_err();
        assert_eq!(err, HjbError::Cancelled);
    }

    #[test]
    fn time_dependent_cost_to_go_grows_with_distance() {
        let (dynamics, cost) = lq();
        let options = TimeDependentOptions {
            horizon: 0.5,
            tolerance: 1e-12,
            ..TimeDependentOptions::default()
        };
        let sol =
            solve_time_dependent(&line(), &dynamics, &cost, &options, &CancelToken::new())
                .unwrap();
        assert_eq!(sol.iterations, 10);
        assert!(sol.converged);
        let v = sol.value.as_slice();
        assert!(v[10].abs() < 1e-12);
        assert!(v[20] > v[15] && v[15] > v[10]);
        // Never more than the cost of sitting still at |x| = 1 for the horizon.
        assert!(v[20] <= 0.5 + 1e-9);
    }
}
