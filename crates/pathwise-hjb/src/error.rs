//! Error types for the HJB solvers and rollouts.

use pathwise_core::GridError;
use std::error::Error;
use std::fmt;

/// Errors from building control models, solving, or simulating.
#[derive(Clone, Debug, PartialEq)]
pub enum HjbError {
    /// Grid or field construction failed.
    Grid(GridError),
    /// A configuration value is out of its valid range.
    InvalidConfig {
        /// Which parameter was rejected, and why.
        reason: String,
    },
    /// A vector has the wrong length for the model it is used with.
    DimensionMismatch {
        /// What the vector describes.
        what: &'static str,
        /// Length the model expects.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },
    /// A NaN or infinity appeared. Always fatal.
    NonFinite {
        /// Iteration or rollout step at which it was detected.
        step: usize,
        /// The quantity that went non-finite (`"state"`, `"control"`, `"value"`, ...).
        what: &'static str,
    },
    /// The cancel token fired between iterations.
    Cancelled,
}

impl HjbError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HjbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid(e) => write!(f, "grid error: {e}"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::DimensionMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what} has length {actual}, expected {expected}"),
            Self::NonFinite { step, what } => {
                write!(f, "non-finite {what} encountered at step {step}")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Error for HjbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for HjbError {
    fn from(e: GridError) -> Self {
        Self::Grid(e)
    }
}
