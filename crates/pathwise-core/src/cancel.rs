//! Cooperative cancellation checked at solver iteration boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag a solver polls between iterations.
///
/// Cloning yields a handle to the same flag. Solvers never block on it;
/// they check [`is_cancelled`](Self::is_cancelled) once per outer
/// iteration and return early with their crate's `Cancelled` error.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
