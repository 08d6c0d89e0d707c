//! Error types for the diffusion solvers.

use pathwise_core::GridError;
use std::error::Error;
use std::fmt;

/// Errors from parsing diffusion configs or running a solver.
#[derive(Clone, Debug, PartialEq)]
pub enum DiffusionError {
    /// Grid construction failed.
    Grid(GridError),
    /// A potential string is not recognised or is malformed.
    UnknownPotential(String),
    /// A beta schedule string is not recognised or is malformed.
    InvalidSchedule(String),
    /// A numeric parameter is out of range.
    InvalidConfig {
        /// Which parameter, and why.
        reason: String,
    },
    /// The density or a particle went NaN or infinite. Always fatal.
    NonFinite {
        /// Outer step at which it was detected.
        step: usize,
        /// `"density"` or `"particle"`.
        what: &'static str,
    },
    /// The cancel token fired between steps.
    Cancelled,
}

impl DiffusionError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DiffusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid(e) => write!(f, "grid error: {e}"),
            Self::UnknownPotential(s) => write!(f, "unknown potential '{s}'"),
            Self::InvalidSchedule(s) => write!(f, "invalid beta schedule '{s}'"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::NonFinite { step, what } => {
                write!(f, "non-finite {what} encountered at step {step}")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Error for DiffusionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for DiffusionError {
    fn from(e: GridError) -> Self {
        Self::Grid(e)
    }
}
