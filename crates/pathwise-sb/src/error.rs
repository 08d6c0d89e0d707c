//! Error types for the transport solver.

use std::error::Error;
use std::fmt;

/// Errors from marginal parsing, cost construction, or the solve.
///
/// Running out of iterations is not an error: see
/// [`SinkhornResult::converged`](crate::SinkhornResult::converged).
#[derive(Clone, Debug, PartialEq)]
pub enum SinkhornError {
    /// A marginal spec could not be parsed or describes an invalid measure.
    InvalidMarginal {
        /// The offending spec (truncated for inline JSON).
        spec: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A cost metric name is not recognised.
    UnknownMetric(String),
    /// Vector or matrix sizes disagree.
    DimensionMismatch {
        /// What was being compared.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// A solver parameter is out of range.
    InvalidConfig {
        /// Which parameter, and why.
        reason: String,
    },
    /// An interpolation time lies outside `[0, 1]`.
    InvalidTime(f64),
    /// A dual potential went NaN or infinite.
    NonFinite {
        /// Iteration at which it was detected.
        iteration: usize,
    },
    /// The cancel token fired between iterations.
    Cancelled,
}

impl fmt::Display for SinkhornError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMarginal { spec, reason } => {
                write!(f, "invalid marginal '{spec}': {reason}")
            }
            Self::UnknownMetric(m) => write!(f, "unknown cost metric '{m}'"),
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what}: expected {expected}, got {actual}"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::InvalidTime(t) => write!(f, "interpolation time {t} outside [0, 1]"),
            Self::NonFinite { iteration } => {
                write!(f, "non-finite dual potential at iteration {iteration}")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Error for SinkhornError {}
