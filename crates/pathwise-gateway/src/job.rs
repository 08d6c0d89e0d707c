//! The job entity and its lifecycle vocabulary.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use pathwise_artifact::{Artifact, ArtifactRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state.
///
/// ```text
/// queued ──▶ running ──▶ succeeded
///    │          │
///    └──────────┴──────▶ failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, waiting for a worker.
    Queued,
    /// A worker is solving it.
    Running,
    /// Finished with metrics and artifacts.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// `succeeded` or `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the lifecycle allows `self → to`.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Which query/subscription surface a job belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobFamily {
    /// `hjbJob`, `hjbEvents`.
    Hjb,
    /// `sbJob`, `sbEvents`.
    Sb,
    /// `diffJob`, `diffEvents`.
    Diffusion,
}

/// Solver behind a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Stationary or time-dependent HJB PDE.
    #[serde(rename = "hjb.pde")]
    HjbPde,
    /// Lattice MDP value iteration.
    #[serde(rename = "hjb.mdp")]
    HjbMdp,
    /// Sinkhorn bridge.
    #[serde(rename = "sb")]
    Sb,
    /// Fokker-Planck density evolution.
    #[serde(rename = "diffusion.fp")]
    DiffusionFp,
    /// Euler-Maruyama particles.
    #[serde(rename = "diffusion.sde")]
    DiffusionSde,
}

impl JobKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HjbPde => "hjb.pde",
            Self::HjbMdp => "hjb.mdp",
            Self::Sb => "sb",
            Self::DiffusionFp => "diffusion.fp",
            Self::DiffusionSde => "diffusion.sde",
        }
    }

    /// Owning family.
    pub fn family(self) -> JobFamily {
        match self {
            Self::HjbPde | Self::HjbMdp => JobFamily::Hjb,
            Self::Sb => JobFamily::Sb,
            Self::DiffusionFp | Self::DiffusionSde => JobFamily::Diffusion,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of one job.
///
/// The [`JobStore`](crate::JobStore) owns the live record; everything
/// handed out is a copy taken at some transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub(crate) id: String,
    pub(crate) kind: JobKind,
    pub(crate) status: JobStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) config: Value,
    pub(crate) metrics: Option<Value>,
    pub(crate) artifacts: Vec<Artifact>,
    pub(crate) error: Option<String>,
}

impl Job {
    /// Unique id (UUID v4).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Solver kind.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Lifecycle state.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the latest transition.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The config exactly as submitted.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Solver metrics, once succeeded.
    pub fn metrics(&self) -> Option<&Value> {
        self.metrics.as_ref()
    }

    /// Produced artifacts, once succeeded.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Failure text, once failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Artifact named `name`.
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name() == name)
    }

    pub(crate) fn redact(mut self) -> Self {
        self.artifacts.clear();
        self
    }

    /// Wire form matching the `Job` GraphQL type.
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            kind: self.kind.as_str().to_string(),
            status: self.status.to_string(),
            created_at: self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: self.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            artifacts: self.artifacts.iter().map(|a| a.describe(&self.id)).collect(),
            error: self.error.clone(),
        }
    }
}

/// Serializable `Job` as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    /// Job id.
    pub id: String,
    /// Kind name.
    pub kind: String,
    /// Status name.
    pub status: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the latest transition.
    pub updated_at: String,
    /// Config as submitted.
    pub config: Value,
    /// Metrics.
    pub metrics: Option<Value>,
    /// Artifact descriptors.
    pub artifacts: Vec<ArtifactRef>,
    /// Failure text.
    pub error: Option<String>,
}
