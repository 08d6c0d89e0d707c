//! Subscription streams over job transitions.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::job::{Job, JobFamily};

/// Job snapshots for one family, optionally narrowed to a single job.
///
/// Only transitions after the subscription are seen. A subscriber that
/// falls more than the store's event buffer behind skips the missed
/// snapshots and carries on.
#[derive(Debug)]
pub struct JobEvents {
    rx: broadcast::Receiver<Job>,
    family: JobFamily,
    job_id: Option<String>,
    redacted: bool,
}

impl JobEvents {
    pub(crate) fn new(
        rx: broadcast::Receiver<Job>,
        family: JobFamily,
        job_id: Option<String>,
        redacted: bool,
    ) -> Self {
        Self {
            rx,
            family,
            job_id,
            redacted,
        }
    }

    fn wants(&self, job: &Job) -> bool {
        job.kind().family() == self.family
            && self.job_id.as_deref().is_none_or(|id| id == job.id())
    }

    /// Next matching snapshot; `None` once the gateway is gone.
    pub async fn next(&mut self) -> Option<Job> {
        loop {
            match self.rx.recv().await {
                Ok(job) if self.wants(&job) => {
                    return Some(if self.redacted { job.redact() } else { job });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, family = ?self.family, "subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
