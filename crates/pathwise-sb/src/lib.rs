//! Entropic optimal transport between two weighted point clouds.
//!
//! # Pipeline
//!
//! 1. [`MarginalSpec::parse`] → [`Marginal`] (points + normalised weights)
//! 2. [`cost_matrix`] under a [`CostMetric`]
//! 3. [`log_sinkhorn`] → [`SinkhornResult`] (dense coupling, duals, history)
//! 4. [`barycentric`] / [`interpolate`] → displacement [`Frame`]s
//!
//! Matrices are dense row-major `Vec<f64>` with explicit `rows`/`cols`.
//! Everything is double precision and deterministic: named marginals
//! that need sampling derive their seed from the spec text.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cost;
pub mod error;
pub mod interpolate;
pub mod marginal;
pub mod sinkhorn;

pub use cost::{cost_matrix, CostMetric};
pub use error::SinkhornError;
pub use interpolate::{barycentric, interpolate, Frame};
pub use marginal::{Marginal, MarginalSpec, MAX_POINTS};
pub use sinkhorn::{
    log_sinkhorn, Diagnostics, IterationRecord, SinkhornConfig, SinkhornResult, WarmStart,
};
