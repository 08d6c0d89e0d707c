//! Density diffusion under a potential or an annealed score.
//!
//! Two views of the same process `dX = v(X, t) dt + sqrt(2β) dW`:
//!
//! - [`run_fokker_planck`]: deterministic finite-volume evolution of the
//!   density on a 2-D grid. Conserves mass exactly under zero-flux and
//!   periodic boundaries.
//! - [`run_euler_maruyama`]: seeded particle simulation, histogrammed on
//!   the same grid.
//!
//! The drift `v` is `-∇V` for a [`Potential`], or the annealed score of
//! a [`ScoreSchedule`] when one is configured.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod drift;
pub mod error;
pub mod fp;
pub mod potential;
pub mod schedule;
pub mod score;
pub mod sde;

pub use config::{FokkerPlanckConfig, SdeConfig};
pub use drift::Drift;
pub use error::DiffusionError;
pub use fp::{run_fokker_planck, FokkerPlanckResult};
pub use potential::{MixtureComponent, Potential};
pub use schedule::BetaSchedule;
pub use score::{annealed_score, annealed_sigma, ScoreSchedule};
pub use sde::{run_euler_maruyama, ParticleSnapshot, SdeResult};
