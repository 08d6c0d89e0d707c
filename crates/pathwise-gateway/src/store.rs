//! In-memory job registry with lifecycle enforcement and change events.
//!
//! Jobs live in an insertion-ordered map so `list()` returns creation
//! order. Every successful transition stamps `updated_at` and publishes
//! a snapshot on a broadcast channel; slow subscribers may lag but never
//! block the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use indexmap::IndexMap;
use pathwise_artifact::Artifact;
use pathwise_core::{CancelToken, Grid};
use pathwise_hjb::{CostModel, Dynamics};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::job::{Job, JobKind, JobStatus};

/// Solved HJB data kept for follow-up rollouts.
#[derive(Debug)]
pub struct HjbPayload {
    /// Grid the policy lives on.
    pub grid: Grid,
    /// Dynamics the job was solved with.
    pub dynamics: Box<dyn Dynamics>,
    /// Running cost the job was solved with.
    pub cost: Box<dyn CostModel>,
    /// Minimising control per grid point.
    pub policy: Vec<Vec<f64>>,
}

/// Solved transport data kept for frame generation.
#[derive(Clone, Debug, PartialEq)]
pub struct SbPayload {
    /// Row-major coupling.
    pub coupling: Vec<f64>,
    /// Source support.
    pub source: Vec<Vec<f64>>,
    /// Target support.
    pub target: Vec<Vec<f64>>,
}

/// Solver-private data attached to a succeeded job.
#[derive(Debug)]
pub enum JobPayload {
    /// From `hjb.pde` or `hjb.mdp`.
    Hjb(HjbPayload),
    /// From `sb`.
    Sb(SbPayload),
}

#[derive(Debug)]
struct Entry {
    job: Job,
    payload: Option<Arc<JobPayload>>,
    cancel: CancelToken,
}

/// Owner of every job record.
#[derive(Debug)]
pub struct JobStore {
    entries: Mutex<IndexMap<String, Entry>>,
    events: broadcast::Sender<Job>,
}

impl JobStore {
    /// Empty store whose event channel buffers `event_buffer` snapshots.
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            entries: Mutex::new(IndexMap::new()),
            events,
        }
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, job: &Job) {
        // No subscribers is fine.
        let _ = self.events.send(job.clone());
    }

    /// Register a new `queued` job.
    pub fn create(&self, kind: JobKind, config: Value) -> Job {
        let now = Utc::now();
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            config,
            metrics: None,
            artifacts: Vec::new(),
            error: None,
        };
        self.entries().insert(
            job.id.clone(),
            Entry {
                job: job.clone(),
                payload: None,
                cancel: CancelToken::new(),
            },
        );
        tracing::debug!(job.id = %job.id, kind = %kind, "job created");
        self.publish(&job);
        job
    }

    fn transition(
        &self,
        id: &str,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, StoreError> {
        let snapshot = {
            let mut entries = self.entries();
            let entry = entries.get_mut(id).ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
            })?;
            let from = entry.job.status;
            if !from.can_transition_to(to) {
                return Err(StoreError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to,
                });
            }
            entry.job.status = to;
            entry.job.updated_at = Utc::now().max(entry.job.updated_at);
            apply(&mut entry.job);
            entry.job.clone()
        };
        tracing::debug!(job.id = %id, status = %to, "job transition");
        self.publish(&snapshot);
        Ok(snapshot)
    }

    /// `queued → running`.
    pub fn mark_running(&self, id: &str) -> Result<Job, StoreError> {
        self.transition(id, JobStatus::Running, |_| {})
    }

    /// `running → succeeded` with results.
    pub fn complete(
        &self,
        id: &str,
        metrics: Value,
        artifacts: Vec<Artifact>,
    ) -> Result<Job, StoreError> {
        self.transition(id, JobStatus::Succeeded, |job| {
            job.metrics = Some(metrics);
            job.artifacts = artifacts;
        })
    }

    /// `queued | running → failed`.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> Result<Job, StoreError> {
        let error = error.into();
        self.transition(id, JobStatus::Failed, |job| job.error = Some(error))
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.entries().get(id).map(|e| e.job.clone())
    }

    /// Snapshots of every job in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.entries().values().map(|e| e.job.clone()).collect()
    }

    /// Keep solver data for follow-up operations.
    pub fn attach(&self, id: &str, payload: JobPayload) -> Result<(), StoreError> {
        let mut entries = self.entries();
        let entry = entries.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        entry.payload = Some(Arc::new(payload));
        Ok(())
    }

    /// Solver data attached to `id`, if any.
    pub fn payload(&self, id: &str) -> Option<Arc<JobPayload>> {
        self.entries().get(id).and_then(|e| e.payload.clone())
    }

    /// The cancel token threaded into `id`'s solve.
    pub fn cancel_token(&self, id: &str) -> Option<CancelToken> {
        self.entries().get(id).map(|e| e.cancel.clone())
    }

    /// Cancel every job that has not finished. Returns how many.
    pub fn cancel_all(&self) -> usize {
        let entries = self.entries();
        let mut n = 0;
        for entry in entries.values().filter(|e| !e.job.status.is_terminal()) {
            entry.cancel.cancel();
            n += 1;
        }
        n
    }

    /// Receive a snapshot after every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Job> {
        self.events.subscribe()
    }

    /// Wait until `id` is `succeeded` or `failed`.
    pub async fn wait_terminal(&self, id: &str) -> Result<Job, StoreError> {
        // Subscribe before reading so no transition slips between the two.
        let mut rx = self.subscribe();
        loop {
            let job = self.get(id).ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
            })?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.id == id && ev.status.is_terminal() => return Ok(ev),
                    Ok(_) => continue,
                    // Missed events; re-read the record.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::NotFound { id: id.to_string() })
                    }
                }
            }
        }
    }
}
