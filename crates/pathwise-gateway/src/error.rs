//! Error types for the gateway layer.

use std::io;
use std::path::PathBuf;

use pathwise_artifact::ArtifactError;
use pathwise_diffusion::DiffusionError;
use pathwise_hjb::HjbError;
use pathwise_sb::SinkhornError;

use crate::auth::Role;
use crate::job::JobStatus;

/// RBAC failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request carried no role at all.
    #[error("no role present on the request context")]
    MissingRole,
    /// The role is below what the operation needs.
    #[error("role '{actual}' is not permitted here; '{required}' or higher is required")]
    Forbidden {
        /// Minimum role for the operation.
        required: Role,
        /// Role on the request.
        actual: Role,
    },
}

/// Job-store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No job has this id.
    #[error("job '{id}' not found")]
    NotFound {
        /// The requested id.
        id: String,
    },
    /// The lifecycle does not allow this move.
    #[error("job '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Job id.
        id: String,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },
}

/// Gateway construction and configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read gateway config {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The TOML did not parse.
    #[error("failed to parse gateway config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid gateway config: {0}")]
    Invalid(String),
    /// The OS refused to start a worker thread.
    #[error("failed to spawn solver worker {index}: {source}")]
    ThreadSpawnFailed {
        /// Worker number.
        index: usize,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Everything a resolver can fail with.
///
/// Solver errors convert in unchanged. A failure inside a queued job
/// never surfaces here; it lands on the job's `error` field instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// RBAC rejected the request.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Lifecycle or lookup failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The supplied config was rejected before any job was created.
    #[error("invalid config: {0}")]
    Validation(String),
    /// The referenced job exists but cannot serve this request yet.
    #[error("job '{id}' not ready: {reason}")]
    NotReady {
        /// Job id.
        id: String,
        /// Why.
        reason: String,
    },
    /// A NaN or infinity appeared in a synchronous computation.
    #[error("numerical failure: {0}")]
    Numerical(String),
    /// HJB solver error.
    #[error(transparent)]
    Hjb(#[from] HjbError),
    /// Diffusion solver error.
    #[error(transparent)]
    Diffusion(#[from] DiffusionError),
    /// Transport solver error.
    #[error(transparent)]
    Sinkhorn(#[from] SinkhornError),
    /// Artifact encoding error.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// The solver queue is at capacity.
    #[error("solver queue full")]
    QueueFull,
    /// The gateway is shutting down and accepts no more work.
    #[error("gateway is shutting down")]
    ShuttingDown,
    /// A solver thread panicked.
    #[error("solver panicked")]
    Panicked,
}

impl GatewayError {
    pub(crate) fn validation(e: impl std::fmt::Display) -> Self {
        Self::Validation(e.to_string())
    }

    /// Whether this is a NaN/Inf failure from any solver.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::Numerical(_)
                | Self::Hjb(HjbError::NonFinite { .. })
                | Self::Diffusion(DiffusionError::NonFinite { .. })
                | Self::Sinkhorn(SinkhornError::NonFinite { .. })
        )
    }
}
