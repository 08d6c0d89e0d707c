//! Asynchronous, access-controlled job gateway over the Pathwise solvers.
//!
//! A mutation validates its config, creates a `queued` [`Job`] in the
//! [`JobStore`], hands the solve to the [`SolverPool`] and returns
//! immediately. Worker threads drive the job through
//! `running → succeeded | failed`; every transition is broadcast to
//! subscribers.
//!
//! ```text
//!   resolver (async)          SolverPool (N threads)         JobStore
//!   ───────────────           ──────────────────────         ────────
//!   assert_role                                              queued
//!   SolverConfig::prepare
//!   store.create ─────────────────────────────────────────▶ (event)
//!   pool.submit ──[bounded]──▶ mark_running ─────────────▶ running
//!   return Job                 PreparedJob::run
//!                              complete / fail ──────────▶ succeeded|failed
//! ```
//!
//! All shared state hangs off an explicit [`GatewayState`]; two
//! [`Gateway`]s never share a store, tracer, or pool.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod job;
pub mod pool;
pub mod schema;
pub mod solver;
pub mod store;
pub mod trace;

pub use auth::{assert_role, GatewayContext, Role};
pub use config::GatewayConfig;
pub use error::{AuthError, ConfigError, GatewayError, StoreError};
pub use events::JobEvents;
pub use gateway::{Gateway, GatewayState, SbRunArgs};
pub use job::{Job, JobFamily, JobKind, JobStatus, JobView};
pub use pool::SolverPool;
pub use schema::SCHEMA_SDL;
pub use solver::{
    HjbMdpConfig, HjbPdeConfig, JobOutcome, PreparedJob, RolloutRequest, SbConfig, SolverConfig,
};
pub use store::{HjbPayload, JobPayload, JobStore, SbPayload};
pub use trace::{InMemoryExporter, NoopExporter, SpanExporter, SpanRecord, SpanStatus, Tracer};
