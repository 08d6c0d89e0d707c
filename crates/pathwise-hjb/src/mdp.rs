//! Discrete-time MDP value iteration and greedy policy extraction.
//!
//! [`MdpProblem`] is the seam: any finite MDP can be solved, and
//! [`LatticeMdp`] builds one from a grid, a dynamics model and a cost by
//! one explicit Euler step per action followed by nearest-lattice-point
//! projection.

use crate::cost::CostModel;
use crate::dynamics::{control_lattice_size, enumerate_controls, Dynamics};
use crate::error::HjbError;
use pathwise_core::{CancelToken, Grid, ValueArray};
use smallvec::{smallvec, SmallVec};

/// Ties are actions whose Q-value is within this of the best.
const TIE_EPSILON: f64 = 1e-9;

/// Outgoing transitions: `(next_state, probability)` pairs.
pub type Transitions = SmallVec<[(usize, f64); 4]>;

/// A finite, cost-minimising MDP.
pub trait MdpProblem {
    /// Number of states.
    fn num_states(&self) -> usize;
    /// Number of actions (the same in every state).
    fn num_actions(&self) -> usize;
    /// Transition distribution of `action` taken in `state`.
    fn transitions(&self, state: usize, action: usize) -> Transitions;
    /// Immediate cost of `action` in `state`.
    fn cost(&self, state: usize, action: usize) -> f64;
    /// Discount factor in `(0, 1)`.
    fn discount(&self) -> f64;
}

/// Parameters shared by [`value_iteration`] and [`LatticeMdp`].
#[derive(Clone, Debug, PartialEq)]
pub struct MdpOptions {
    /// Euler step used to build lattice transitions.
    pub dt: f64,
    /// Discount factor in `(0, 1)`.
    pub discount: f64,
    /// Stop once `max |ΔV|` falls below this.
    pub tolerance: f64,
    /// Sweep budget.
    pub max_iterations: usize,
    /// Control lattice spacing; the model default when `None`.
    pub control_resolution: Option<f64>,
}

impl Default for MdpOptions {
    fn default() -> Self {
        Self {
            dt: 0.1,
            discount: 0.95,
            tolerance: 1e-6,
            max_iterations: 2000,
            control_resolution: None,
        }
    }
}

impl MdpOptions {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), HjbError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(HjbError::invalid(format!(
                "dt must be finite and positive, got {}",
                self.dt
            )));
        }
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(HjbError::invalid(format!(
                "discount must lie in (0, 1), got {}",
                self.discount
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(HjbError::invalid(format!(
                "tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(HjbError::invalid("maxIterations must be at least 1"));
        }
        Ok(())
    }
}

/// Output of [`value_iteration`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValueIterationResult {
    /// Optimal cost-to-go per state.
    pub value: Vec<f64>,
    /// Sweeps performed.
    pub iterations: usize,
    /// Final `max |ΔV|`.
    pub residual: f64,
    /// Whether the residual fell below tolerance.
    pub converged: bool,
}

/// Greedy action per state with respect to a value function.
#[derive(Clone, Debug, PartialEq)]
pub struct GreedyPolicy {
    /// Index of the chosen action per state (earliest on ties).
    pub actions: Vec<usize>,
    /// Number of states where more than one action attains the minimum.
    pub ties: usize,
}

fn q_value(problem: &dyn MdpProblem, value: &[f64], s: usize, a: usize) -> f64 {
    let future: f64 = problem
        .transitions(s, a)
        .iter()
        .map(|&(next, p)| p * value[next])
        .sum();
    problem.cost(s, a) + problem.discount() * future
}

/// Jacobi value iteration `V(s) ← min_a [c(s,a) + γ Σ p(s'|s,a) V(s')]`
/// from `V = 0`.
pub fn value_iteration(
    problem: &dyn MdpProblem,
    tolerance: f64,
    max_iterations: usize,
    cancel: &CancelToken,
) -> Result<ValueIterationResult, HjbError> {
    let n = problem.num_states();
    let mut value = vec![0.0; n];
    let mut next = vec![0.0; n];
    let mut residual = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        if cancel.is_cancelled() {
            return Err(HjbError::Cancelled);
        }
        for (s, slot) in next.iter_mut().enumerate() {
            *slot = (0..problem.num_actions())
                .map(|a| q_value(problem, &value, s, a))
                .fold(f64::INFINITY, f64::min);
        }
        iterations += 1;
        if next.iter().any(|v| !v.is_finite()) {
            return Err(HjbError::NonFinite {
                step: iterations,
                what: "value",
            });
        }
        residual = next
            .iter()
            .zip(&value)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        std::mem::swap(&mut value, &mut next);
        if residual < tolerance {
            converged = true;
            break;
        }
    }

    tracing::debug!(iterations, residual, converged, "value iteration finished");
    Ok(ValueIterationResult {
        value,
        iterations,
        residual,
        converged,
    })
}

/// The action minimising the one-step lookahead in every state.
pub fn extract_greedy_policy(problem: &dyn MdpProblem, value: &[f64]) -> GreedyPolicy {
    let mut ties = 0;
    let actions = (0..problem.num_states())
        .map(|s| {
            let q: Vec<f64> = (0..problem.num_actions())
                .map(|a| q_value(problem, value, s, a))
                .collect();
            let (best, best_q) = q
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |acc, (a, &v)| {
                    if v < acc.1 {
                        (a, v)
                    } else {
                        acc
                    }
                });
            if q.iter().filter(|&&v| v - best_q <= TIE_EPSILON).count() > 1 {
                ties += 1;
            }
            best
        })
        .collect();
    GreedyPolicy { actions, ties }
}

/// A deterministic MDP over the points of a grid.
///
/// Action `a` in state `s` moves to the lattice point nearest
/// `x_s + dt · f(x_s, u_a)` and costs `L(x_s, u_a) · dt`.
#[derive(Debug)]
pub struct LatticeMdp {
    grid: Grid,
    controls: Vec<Vec<f64>>,
    next: Vec<usize>,
    costs: Vec<f64>,
    discount: f64,
}

impl LatticeMdp {
    /// Tabulate transitions and costs for every `(state, action)` pair.
    pub fn new(
        grid: &Grid,
        dynamics: &dyn Dynamics,
        cost: &dyn CostModel,
        options: &MdpOptions,
    ) -> Result<Self, HjbError> {
        options.validate()?;
        if dynamics.state_dim() != grid.ndim() {
            return Err(HjbError::DimensionMismatch {
                what: "grid",
                expected: dynamics.state_dim(),
                actual: grid.ndim(),
            });
        }
        let actions = control_lattice_size(dynamics, options.control_resolution);
        let entries = grid.len().checked_mul(actions).ok_or_else(|| {
            HjbError::invalid(format!(
                "transition table of {} states x {actions} actions overflows",
                grid.len()
            ))
        })?;
        let table_too_large = |_| {
            HjbError::invalid(format!("transition table of {entries} entries cannot be allocated"))
        };
        let mut next: Vec<usize> = Vec::new();
        next.try_reserve_exact(entries).map_err(table_too_large)?;
        let mut costs: Vec<f64> = Vec::new();
        costs.try_reserve_exact(entries).map_err(table_too_large)?;
        let controls: Vec<Vec<f64>> = enumerate_controls(dynamics, options.control_resolution)
            .iter()
            .map(|u| dynamics.clip(u))
            .collect();
        let mut failure = None;
        grid.for_each(|_, _, x| {
            for u in &controls {
                let rate = dynamics.rate(x, u);
                let moved: Vec<f64> = x
                    .iter()
                    .zip(&rate)
                    .map(|(xi, fi)| xi + options.dt * fi)
                    .collect();
                let c = cost.stage(x, u) * options.dt;
                if failure.is_none() && (moved.iter().any(|v| !v.is_finite()) || !c.is_finite()) {
                    failure = Some(HjbError::NonFinite {
                        step: 0,
                        what: "transition",
                    });
                }
                next.push(grid.nearest_index(&moved));
                costs.push(c);
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(Self {
            grid: grid.clone(),
            controls,
            next,
            costs,
            discount: options.discount,
        })
    }

    /// The action lattice (clipped controls).
    pub fn controls(&self) -> &[Vec<f64>] {
        &self.controls
    }

    /// Run value iteration and extract the greedy policy.
    pub fn solve(
        &self,
        options: &MdpOptions,
        cancel: &CancelToken,
    ) -> Result<MdpSolution, HjbError> {
        let vi = value_iteration(self, options.tolerance, options.max_iterations, cancel)?;
        let greedy = extract_greedy_policy(self, &vi.value);
        let policy = greedy
            .actions
            .iter()
            .map(|&a| self.controls[a].clone())
            .collect();
        Ok(MdpSolution {
            value: ValueArray::from_vec(self.grid.clone(), vi.value)?,
            policy,
            iterations: vi.iterations,
            residual: vi.residual,
            converged: vi.converged,
            ties: greedy.ties,
        })
    }
}

impl MdpProblem for LatticeMdp {
    fn num_states(&self) -> usize {
        self.grid.len()
    }

    fn num_actions(&self) -> usize {
        self.controls.len()
    }

    fn transitions(&self, state: usize, action: usize) -> Transitions {
        smallvec![(self.next[state * self.controls.len() + action], 1.0)]
    }

    fn cost(&self, state: usize, action: usize) -> f64 {
        self.costs[state * self.controls.len() + action]
    }

    fn discount(&self) -> f64 {
        self.discount
    }
}

/// Solved lattice MDP.
#[derive(Debug, PartialEq)]
pub struct MdpSolution {
    /// Cost-to-go on the grid.
    pub value: ValueArray,
    /// Greedy control per grid point, in flat order.
    pub policy: Vec<Vec<f64>>,
    /// Value-iteration sweeps.
    pub iterations: usize,
    /// Final `max |ΔV|`.
    pub residual: f64,
    /// Whether value iteration met its tolerance.
    pub converged: bool,
    /// States with more than one optimal action.
    pub ties: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::QuadraticCost;
    use crate::dynamics::SingleIntegrator;

    /// Two states: stay in 0 for 1, jump to absorbing 1 for 1.5.
    struct Chain {
        duplicate_actions: bool,
    }

    impl MdpProblem for Chain {
        fn num_states(&self) -> usize {
            2
        }
        fn num_actions(&self) -> usize {
            2
        }
        fn transitions(&self, state: usize, action: usize) -> Transitions {
            match (state, action, self.duplicate_actions) {
                (_, _, true) | (1, _, _) => smallvec![(state, 1.0)],
                (0, 0, _) => smallvec![(0, 1.0)],
                _ => smallvec![(1, 1.0)],
            }
        }
        fn cost(&self, state: usize, action: usize) -> f64 {
            match (state, action, self.duplicate_actions) {
                (_, _, true) => 1.0,
                (1, _, _) => 0.0,
                (0, 0, _) => 1.0,
                _ => 1.5,
            }
        }
        fn discount(&self) -> f64 {
            0.5
        }
    }

    #[test]
    fn chain_prefers_jumping() {
        let chain = Chain {
            duplicate_actions: false,
        };
        let vi = value_iteration(&chain, 1e-9, 1000, &CancelToken::new()).unwrap();
        assert!(vi.converged);
        assert!((vi.value[0] - 1.5).abs() < 1e-8);
        assert_eq!(vi.value[1], 0.0);
        let greedy = extract_greedy_policy(&chain, &vi.value);
        assert_eq!(greedy.actions[0], 1);
        // State 1 is absorbing under both actions.
        assert_eq!(greedy.ties, 1);
    }

    #[test]
    fn identical_actions_tie_everywhere() {
        let chain = Chain {
            duplicate_actions: true,
        };
        let vi = value_iteration(&chain, 1e-9, 1000, &CancelToken::new()).unwrap();
        let greedy = extract_greedy_policy(&chain, &vi.value);
        assert_eq!(greedy.ties, 2);
        assert_eq!(greedy.actions, vec![0, 0]);
    }

    #[test]
    fn lattice_mdp_steers_home() {
        let grid = Grid::new(&[11], &[0.2], &[-1.0]).unwrap();
        let dynamics = SingleIntegrator::new(1, 1.0, 1.0).unwrap();
        let cost = QuadraticCost::new(vec![1.0], vec![0.0], None).unwrap();
        let options = MdpOptions {
            dt: 0.2,
            discount: 0.9,
            ..MdpOptions::default()
        };
        let mdp = LatticeMdp::new(&grid, &dynamics, &cost, &options).unwrap();
        assert_eq!(mdp.controls().len(), 3);

        let sol = mdp.solve(&options, &CancelToken::new()).unwrap();
        assert!(sol.converged);
        let v = sol.value.as_slice();
        assert!(v[5].abs() < 1e-12);
        assert!(v[8] > v[6]);
        assert_eq!(sol.policy[8], vec![-1.0]);
        assert_eq!(sol.policy[2], vec![1.0]);
        assert_eq!(sol.policy[5], vec![0.0]);
    }

    #[test]
    fn oversized_transition_table_is_rejected_before_allocation() {
        let grid = Grid::new(&[11], &[0.2], &[-1.0]).unwrap();
        let dynamics = SingleIntegrator::new(1, 1e300, 1.0).unwrap();
        let cost = QuadraticCost::new(vec![1.0], vec![0.0], None).unwrap();
        let err = LatticeMdp::new(&grid, &dynamics, &cost, &MdpOptions::default()).unwrap_err();
        assert!(matches!(err, HjbError::InvalidConfig { .. }), "{err}");
    }

    #[test]
    fn discount_of_one_rejected() {
        let options = MdpOptions {
            discount: 1.0,
            ..MdpOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
