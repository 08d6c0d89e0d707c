//! Grid-based dynamic programming for optimal control.
//!
//! Provides the upwind (Godunov) gradient, the control-system models
//! ([`Dynamics`], [`CostModel`]), the stationary and finite-horizon HJB
//! solvers, lattice MDP value iteration, and forward [`Rollout`]
//! simulation of a policy.
//!
//! # Solve order
//!
//! 1. Build a [`Grid`](pathwise_core::Grid), a dynamics model and a cost.
//! 2. [`solve_stationary`] or [`solve_time_dependent`] → [`HjbSolution`]
//!    (value function plus the argmin control at every grid point).
//! 3. Wrap the solution in a [`GridPolicy`] and drive a [`Rollout`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cost;
pub mod dynamics;
pub mod error;
pub mod gradient;
pub mod hamiltonian;
pub mod mdp;
pub mod pde;
pub mod rollout;

pub use cost::{CostKind, CostModel, CostSpec, Obstacle, ObstacleCost, QuadraticCost};
pub use dynamics::{
    control_lattice_size, enumerate_controls, DoubleIntegrator, DubinsCar, Dynamics,
    DynamicsKind, DynamicsOptions, DynamicsSpec, SingleIntegrator, SolveMode,
};
pub use error::HjbError;
pub use gradient::{godunov_gradient, UpwindGradient};
pub use hamiltonian::hamiltonian;
pub use mdp::{
    extract_greedy_policy, value_iteration, GreedyPolicy, LatticeMdp, MdpOptions, MdpProblem,
    MdpSolution, Transitions, ValueIterationResult,
};
pub use pde::{
    solve_stationary, solve_time_dependent, HjbSolution, StationaryOptions, TimeDependentOptions,
};
pub use rollout::{GridPolicy, Policy, Rollout, RolloutSample, RolloutTrace};
