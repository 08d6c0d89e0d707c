//! Fixed pool of solver threads fed by a bounded queue.
//!
//! Solves are CPU-bound and never suspend, so they run on plain OS
//! threads rather than the async runtime. Submitting never blocks: a
//! full queue is reported immediately.
//!
//! ```text
//!   submit ──try_send──▶ [bounded(queue_capacity)] ──recv──▶ pathwise-solver-0..N
//! ```
//!
//! Shutdown drops the sender; workers drain what is already queued and
//! exit when the channel reports disconnection.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::error::{ConfigError, GatewayError};

/// A unit of work for a solver thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker threads draining a bounded task queue.
#[derive(Debug)]
pub struct SolverPool {
    tx: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

fn worker_loop(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("solver task panicked");
        }
    }
}

impl SolverPool {
    /// Start `worker_count` threads behind a queue of `queue_capacity`.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Result<Self, ConfigError> {
        if worker_count == 0 || queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "solver pool needs at least one worker and one queue slot".into(),
            ));
        }
        let (tx, rx) = crossbeam_channel::bounded::<Task>(queue_capacity);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("pathwise-solver-{index}"))
                .spawn(move || worker_loop(rx))
                .map_err(|source| ConfigError::ThreadSpawnFailed { index, source })?;
            workers.push(handle);
        }
        tracing::info!(worker_count, queue_capacity, "solver pool started");
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            worker_count,
        })
    }

    /// Threads started.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queue `task` without blocking.
    pub fn submit(&self, task: Task) -> Result<(), GatewayError> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(GatewayError::ShuttingDown)?;
        tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => GatewayError::QueueFull,
            TrySendError::Disconnected(_) => GatewayError::ShuttingDown,
        })
    }

    /// Close the queue, let workers drain it, and join them.
    /// Returns the number of threads joined. Idempotent.
    pub fn shutdown(&self) -> usize {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut joined = 0;
        for handle in workers {
            if handle.join().is_ok() {
                joined += 1;
            }
        }
        if joined > 0 {
            tracing::info!(joined, "solver pool stopped");
        }
        joined
    }
}

impl Drop for SolverPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
