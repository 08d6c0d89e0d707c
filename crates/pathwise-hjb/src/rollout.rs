//! Forward simulation of a closed-loop policy.
//!
//! A [`Rollout`] is a consuming iterator: each call to `next` advances the
//! state by one explicit Euler step and yields the sample for the state
//! it left. It cannot be rewound; build a new one to replay.

use crate::cost::CostModel;
use crate::dynamics::Dynamics;
use crate::error::HjbError;
use pathwise_core::Grid;
use serde::Serialize;

/// A feedback law `state → control`.
pub trait Policy {
    /// Control to apply at `state`.
    fn control(&self, state: &[f64]) -> Vec<f64>;
}

impl<F> Policy for F
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn control(&self, state: &[f64]) -> Vec<f64> {
        self(state)
    }
}

/// Piecewise-constant policy read from a solved grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridPolicy {
    grid: Grid,
    controls: Vec<Vec<f64>>,
}

impl GridPolicy {
    /// Pair a grid with one control per grid point (flat order).
    pub fn new(grid: Grid, controls: Vec<Vec<f64>>) -> Result<Self, HjbError> {
        if controls.len() != grid.len() {
            return Err(HjbError::DimensionMismatch {
                what: "policy",
                expected: grid.len(),
                actual: controls.len(),
            });
        }
        Ok(Self { grid, controls })
    }

    /// The grid the policy is defined on.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Controls in flat grid order.
    pub fn controls(&self) -> &[Vec<f64>] {
        &self.controls
    }
}

impl Policy for GridPolicy {
    fn control(&self, state: &[f64]) -> Vec<f64> {
        self.controls[self.grid.nearest_index(state)].clone()
    }
}

/// One step of a rollout.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RolloutSample {
    /// Step index, from 0.
    pub step: usize,
    /// Simulation time at the start of the step.
    pub time: f64,
    /// State at the start of the step.
    pub state: Vec<f64>,
    /// Control applied during the step (clipped).
    pub control: Vec<f64>,
    /// Stage cost rate at `(state, control)`.
    pub cost: f64,
}

/// A drained rollout.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutTrace {
    /// Every step in order.
    pub samples: Vec<RolloutSample>,
    /// State after the last step.
    pub final_state: Vec<f64>,
    /// `Σ cost · dt`.
    pub total_cost: f64,
}

/// Explicit-Euler closed-loop simulation.
///
/// # Examples
///
/// ```
/// use pathwise_hjb::{QuadraticCost, Rollout, SingleIntegrator};
///
/// let dynamics = SingleIntegrator::new(2, 5.0, 0.5).unwrap();
/// let cost = QuadraticCost::new(vec![1.0, 1.0], vec![1.0, 1.0], None).unwrap();
/// let policy = |x: &[f64]| x.iter().map(|v| -v).collect::<Vec<_>>();
/// let trace = Rollout::new(&dynamics, &policy, &cost, vec![1.0, -1.0], 0.1, 50)
///     .unwrap()
///     .run()
///     .unwrap();
/// assert!(trace.final_state.iter().all(|x| x.abs() < 0.1));
/// assert!(trace.total_cost > 0.0);
/// ```
pub struct Rollout<'a> {
    dynamics: &'a dyn Dynamics,
    policy: &'a dyn Policy,
    cost: &'a dyn CostModel,
    state: Vec<f64>,
    dt: f64,
    steps: usize,
    step: usize,
    total_cost: f64,
    failed: bool,
}

impl<'a> Rollout<'a> {
    /// Validate `start` and `dt` and position the rollout at step 0.
    pub fn new(
        dynamics: &'a dyn Dynamics,
        policy: &'a dyn Policy,
        cost: &'a dyn CostModel,
        start: Vec<f64>,
        dt: f64,
        steps: usize,
    ) -> Result<Self, HjbError> {
        if start.len() != dynamics.state_dim() {
            return Err(HjbError::DimensionMismatch {
                what: "start",
                expected: dynamics.state_dim(),
                actual: start.len(),
            });
        }
        if start.iter().any(|x| !x.is_finite()) {
            return Err(HjbError::invalid("start state must be finite"));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(HjbError::invalid(format!(
                "dt must be finite and positive, got {dt}"
            )));
        }
        Ok(Self {
            dynamics,
            policy,
            cost,
            state: start,
            dt,
            steps,
            step: 0,
            total_cost: 0.0,
            failed: false,
        })
    }

    /// Current state (the next sample's starting point).
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Cost accumulated so far.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Drain the rollout. The first numerical failure aborts the run.
    pub fn run(mut self) -> Result<RolloutTrace, HjbError> {
        let mut samples = Vec::new();
        while let Some(sample) = self.next() {
            samples.push(sample?);
        }
        Ok(RolloutTrace {
            samples,
            final_state: self.state,
            total_cost: self.total_cost,
        })
    }

    fn fail(&mut self, what: &'static str) -> Option<Result<RolloutSample, HjbError>> {
        self.failed = true;
        Some(Err(HjbError::NonFinite {
            step: self.step,
            what,
        }))
    }
}

impl Iterator for Rollout<'_> {
    type Item = Result<RolloutSample, HjbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.step >= self.steps {
            return None;
        }
        let control = self.dynamics.clip(&self.policy.control(&self.state));
        if control.iter().any(|u| !u.is_finite()) {
            return self.fail("control");
        }
        let cost = self.cost.stage(&self.state, &control);
        if !cost.is_finite() {
            return self.fail("cost");
        }
        let rate = self.dynamics.rate(&self.state, &control);
        let next: Vec<f64> = self
            .state
            .iter()
            .zip(&rate)
            .map(|(x, f)| x + self.dt * f)
            .collect();
        if next.iter().any(|x| !x.is_finite()) {
            return self.fail("state");
        }

        let sample = RolloutSample {
            step: self.step,
            time: self.step as f64 * self.dt,
            state: std::mem::replace(&mut self.state, next),
            control,
            cost,
        };
        self.total_cost += cost * self.dt;
        self.step += 1;
        Some(Ok(sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.steps - self.step))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::QuadraticCost;
    use crate::dynamics::SingleIntegrator;
    use proptest::prelude::*;

    fn setup() -> (SingleIntegrator, QuadraticCost) {
        (
            SingleIntegrator::new(2, 5.0, 0.5).unwrap(),
            QuadraticCost::new(vec![1.0, 1.0], vec![1.0, 1.0], None).unwrap(),
        )
    }

    fn pull_to_origin(x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| -v).collect()
    }

    #[test]
    fn linear_feedback_converges() {
        let (dynamics, cost) = setup();
        let trace = Rollout::new(&dynamics, &pull_to_origin, &cost, vec![1.0, -1.0], 0.1, 50)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(trace.samples.len(), 50);
        assert!(trace.final_state[0].abs() < 0.1);
        assert!(trace.final_state[1].abs() < 0.1);
        assert!(trace.total_cost > 0.0);
        // x_k = 0.9^k: first sample starts at the initial state.
        assert_eq!(trace.samples[0].state, vec![1.0, -1.0]);
        assert!((trace.samples[1].state[0] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn rollouts_are_deterministic() {
        let (dynamics, cost) = setup();
        let run = || {
            Rollout::new(&dynamics, &pull_to_origin, &cost, vec![0.3, 0.7], 0.05, 40)
                .unwrap()
                .run()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn nan_control_is_fatal_and_ends_iteration() {
        let (dynamics, cost) = setup();
        let bad = |x: &[f64]| {
            if x[0] < 0.5 {
                vec![f64::NAN, 0.0]
            } else {
                vec![-1.0, 0.0]
            }
        };
        let mut rollout = Rollout::new(&dynamics, &bad, &cost, vec![1.0, 0.0], 0.1, 20).unwrap();
        let mut ok = 0;
        let mut err = None;
        for item in rollout.by_ref() {
            match item {
                Ok(_) => ok += 1,
                Err(e) => err = Some(e),
            }
        }
        assert_eq!(ok, 6);
        assert_eq!(
            err,
            Some(HjbError::NonFinite {
                step: 6,
                what: "control"
            })
        );
        assert!(rollout.next().is_none());
    }

    #[test]
    fn huge_step_overflows_to_state_error() {
        let (dynamics, cost) = setup();
        let err = Rollout::new(&dynamics, &pull_to_origin, &cost, vec![1.0, 1.0], 1e308, 5)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            HjbError::NonFinite {
                what: "state" | "cost",
                ..
            }
        ));
    }

    #[test]
    fn grid_policy_uses_nearest_point() {
        let grid = Grid::new(&[3], &[1.0], &[0.0]).unwrap();
        let policy =
            GridPolicy::new(grid, vec![vec![1.0], vec![0.0], vec![-1.0]]).unwrap();
        assert_eq!(policy.control(&[0.2]), vec![1.0]);
        assert_eq!(policy.control(&[1.4]), vec![0.0]);
        assert_eq!(policy.control(&[9.0]), vec![-1.0]);
    }

    #[test]
    fn bad_start_rejected() {
        let (dynamics, cost) = setup();
        assert!(Rollout::new(&dynamics, &pull_to_origin, &cost, vec![1.0], 0.1, 5).is_err());
        assert!(
            Rollout::new(&dynamics, &pull_to_origin, &cost, vec![f64::NAN, 0.0], 0.1, 5).is_err()
        );
        assert!(Rollout::new(&dynamics, &pull_to_origin, &cost, vec![0.0, 0.0], 0.0, 5).is_err());
    }

    proptest! {
        #[test]
        fn stable_feedback_is_reproducible_and_contracting(
            x0 in -2.0f64..2.0,
            y0 in -2.0f64..2.0,
            dt in 0.01f64..0.2,
            steps in 1usize..60,
        ) {
            let (dynamics, cost) = setup();
            let run = || {
                Rollout::new(&dynamics, &pull_to_origin, &cost, vec![x0, y0], dt, steps)
                    .unwrap()
                    .run()
                    .unwrap()
            };
            let first = run();
            prop_assert_eq!(&first, &run());
            prop_assert_eq!(first.samples.len(), steps);
            let start = x0.abs().max(y0.abs());
            let end = first.final_state.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            prop_assert!(end <= start + 1e-12);
            prop_assert!(first.total_cost >= 0.0);
        }
    }
}
