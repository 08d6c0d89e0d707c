//! Span tracing around externally invoked operations.
//!
//! [`Tracer`] does two things per operation: it opens a
//! `tracing::info_span!` so log lines correlate, and it builds a
//! [`SpanRecord`] that goes to a pluggable [`SpanExporter`]. The
//! exporter is the seam to an external collector; this crate only ships
//! [`InMemoryExporter`] and [`NoopExporter`].
//!
//! A failing operation is recorded with status [`SpanStatus::Error`]
//! and its error text, then the original error is returned unchanged.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::Instrument;

/// Outcome of a span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanStatus {
    /// The operation returned `Ok`.
    Ok,
    /// The operation returned `Err`.
    Error,
}

/// One finished span.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRecord {
    /// Operation name, e.g. `hjb.solve_pde`.
    pub name: String,
    /// Key/value annotations in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Outcome.
    pub status: SpanStatus,
    /// Error text when `status` is `Error`.
    pub error: Option<String>,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Elapsed time.
    pub duration: Duration,
}

impl SpanRecord {
    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Destination for finished spans.
pub trait SpanExporter: Send + Sync {
    /// Accept one finished span. Must not block for long.
    fn export(&self, span: SpanRecord);
}

/// Discards every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopExporter;

impl SpanExporter for NoopExporter {
    fn export(&self, _span: SpanRecord) {}
}

/// Keeps every span in memory, in export order.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    spans: Mutex<Vec<SpanRecord>>,
}

impl InMemoryExporter {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything exported so far.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spans named `name`.
    pub fn named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, span: SpanRecord) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}

/// Wraps operations in spans. Cheap to clone.
#[derive(Clone)]
pub struct Tracer {
    exporter: Arc<dyn SpanExporter>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

struct OpenSpan {
    name: &'static str,
    attributes: Vec<(String, String)>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Tracer {
    /// Tracer exporting to `exporter`.
    pub fn new(exporter: Arc<dyn SpanExporter>) -> Self {
        Self { exporter }
    }

    fn open(name: &'static str, attributes: Vec<(String, String)>) -> OpenSpan {
        OpenSpan {
            name,
            attributes,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn close<T, E: fmt::Display>(&self, span: OpenSpan, result: &Result<T, E>) {
        let (status, error) = match result {
            Ok(_) => (SpanStatus::Ok, None),
            Err(e) => {
                let text = e.to_string();
                tracing::warn!(span = span.name, error = %text, "operation failed");
                (SpanStatus::Error, Some(text))
            }
        };
        self.exporter.export(SpanRecord {
            name: span.name.to_string(),
            attributes: span.attributes,
            status,
            error,
            started_at: span.started_at,
            duration: span.clock.elapsed(),
        });
    }

    /// Run `op` inside a span named `name`.
    pub async fn in_span<T, E, F>(
        &self,
        name: &'static str,
        attributes: Vec<(String, String)>,
        op: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let span = Self::open(name, attributes);
        let result = op.instrument(tracing::info_span!("op", op = name)).await;
        self.close(span, &result);
        result
    }

    /// Blocking counterpart of [`in_span`](Self::in_span) for solver threads.
    pub fn record<T, E, F>(
        &self,
        name: &'static str,
        attributes: Vec<(String, String)>,
        op: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let span = Self::open(name, attributes);
        let result = tracing::info_span!("op", op = name).in_scope(op);
        self.close(span, &result);
        result
    }
}

/// Shorthand for building an attribute list.
pub(crate) fn attrs<const N: usize>(pairs: [(&str, String); N]) -> Vec<(String, String)> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
