//! Pathwise: deterministic solvers for stochastic control and diffusion.
//!
//! This is the facade crate. It re-exports every sub-crate under a short
//! module name and collects the common types in [`prelude`].
//!
//! # Quick start
//!
//! ```rust
//! use pathwise::prelude::*;
//!
//! // Solve a small 2-D LQ problem directly, without the gateway.
//! let grid = GridSpec {
//!     shape: vec![9, 9],
//!     spacing: vec![0.5, 0.5],
//!     origin: vec![-2.0, -2.0],
//! }
//! .build()
//! .unwrap();
//! let dynamics = SingleIntegrator::new(2, 2.0, 0.5).unwrap();
//! let cost = QuadraticCost::new(vec![1.0, 1.0], vec![1.0, 1.0], None).unwrap();
//! let solution = solve_stationary(
//!     &grid,
//!     &dynamics,
//!     &cost,
//!     &StationaryOptions::default(),
//!     &CancelToken::new(),
//! )
//! .unwrap();
//! assert_eq!(solution.policy.len(), grid.len());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`grid`] | `pathwise-core` | Grids, boundaries, seeded RNG, cancel tokens |
//! | [`hjb`] | `pathwise-hjb` | HJB PDE and MDP solvers, dynamics, rollouts |
//! | [`diffusion`] | `pathwise-diffusion` | Fokker-Planck and Euler-Maruyama |
//! | [`sb`] | `pathwise-sb` | Log-domain Sinkhorn bridge and interpolation |
//! | [`artifact`] | `pathwise-artifact` | Artifact model and encoders |
//! | [`gateway`] | `pathwise-gateway` | Job store, RBAC, tracing, resolvers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Grids, boundaries, and determinism primitives (`pathwise-core`).
pub use pathwise_core as grid;

/// Optimal-control solvers (`pathwise-hjb`).
///
/// [`hjb::solve_stationary`], [`hjb::solve_time_dependent`] and
/// [`hjb::LatticeMdp`] produce policies; [`hjb::Rollout`] drives them.
pub use pathwise_hjb as hjb;

/// Density and particle diffusion (`pathwise-diffusion`).
pub use pathwise_diffusion as diffusion;

/// Entropic optimal transport (`pathwise-sb`).
pub use pathwise_sb as sb;

/// Solver outputs as named artifacts (`pathwise-artifact`).
pub use pathwise_artifact as artifact;

/// The job gateway (`pathwise-gateway`).
///
/// Start here when solves should run asynchronously behind RBAC:
/// [`gateway::Gateway::new`], then the resolver methods.
pub use pathwise_gateway as gateway;

/// Common imports.
///
/// ```rust
/// use pathwise::prelude::*;
/// ```
pub mod prelude {
    // Grid and determinism
    pub use pathwise_core::{
        Boundary, BoundarySpec, CancelToken, DeterministicRng, Grid, GridSpec, ValueArray,
    };

    // Control
    pub use pathwise_hjb::{
        solve_stationary, solve_time_dependent, CostModel, CostSpec, Dynamics, DynamicsSpec,
        GridPolicy, LatticeMdp, MdpOptions, QuadraticCost, Rollout, SingleIntegrator,
        StationaryOptions, TimeDependentOptions,
    };

    // Diffusion
    pub use pathwise_diffusion::{
        run_euler_maruyama, run_fokker_planck, FokkerPlanckConfig, SdeConfig,
    };

    // Transport
    pub use pathwise_sb::{
        cost_matrix, interpolate, log_sinkhorn, CostMetric, Marginal, SinkhornConfig,
    };

    // Artifacts
    pub use pathwise_artifact::{Artifact, ArtifactData};

    // Gateway
    pub use pathwise_gateway::{
        Gateway, GatewayConfig, GatewayContext, GatewayError, Job, JobStatus, Role, SbRunArgs,
        SolverConfig,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn prelude_covers_a_gateway_round_trip() {
        let gateway = Gateway::new(
            GatewayConfig {
                worker_count: Some(1),
                ..GatewayConfig::default()
            },
            Arc::new(crate::gateway::NoopExporter),
        )
        .unwrap();
        let ctx = GatewayContext::new(Role::Operator);
        let job = gateway
            .sb_run(&ctx, SbRunArgs::new("uniform:0:1:8", "uniform:2:3:8", 0.1))
            .await
            .unwrap();
        let done = gateway.wait_for(job.id()).await.unwrap();
        assert_eq!(done.status(), JobStatus::Succeeded);
    }
}
