//! Diffusion-coefficient schedules `β(step)`.

use crate::error::DiffusionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `const:<b>` or `linear:<b0>:<b1>`.
///
/// # Examples
///
/// ```
/// use pathwise_diffusion::BetaSchedule;
///
/// let beta: BetaSchedule = "linear:0.0:1.0".parse().unwrap();
/// assert_eq!(beta.at(0, 5), 0.0);
/// assert_eq!(beta.at(4, 5), 1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BetaSchedule {
    /// The same coefficient at every step.
    Constant(f64),
    /// Linear ramp from `start` at the first step to `end` at the last.
    Linear {
        /// First-step value.
        start: f64,
        /// Last-step value.
        end: f64,
    },
}

impl Default for BetaSchedule {
    fn default() -> Self {
        Self::Constant(0.02)
    }
}

impl BetaSchedule {
    /// Coefficient at `step` of `total`.
    pub fn at(&self, step: usize, total: usize) -> f64 {
        match *self {
            Self::Constant(b) => b,
            Self::Linear { start, end } => {
                let span = total.saturating_sub(1).max(1) as f64;
                let tau = (step as f64 / span).min(1.0);
                start + (end - start) * tau
            }
        }
    }

    /// Largest coefficient the schedule reaches.
    pub fn max(&self) -> f64 {
        match *self {
            Self::Constant(b) => b,
            Self::Linear { start, end } => start.max(end),
        }
    }
}

fn parse_value(text: &str, raw: &str) -> Result<f64, DiffusionError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| DiffusionError::InvalidSchedule(text.to_string()))
}

impl FromStr for BetaSchedule {
    type Err = DiffusionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        match parts.as_slice() {
            ["const", b] => Ok(Self::Constant(parse_value(text, b)?)),
            ["linear", b0, b1] => Ok(Self::Linear {
                start: parse_value(text, b0)?,
                end: parse_value(text, b1)?,
            }),
            _ => Err(DiffusionError::InvalidSchedule(text.to_string())),
        }
    }
}

impl TryFrom<String> for BetaSchedule {
    type Error = DiffusionError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl fmt::Display for BetaSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(b) => write!(f, "const:{b}"),
            Self::Linear { start, end } => write!(f, "linear:{start}:{end}"),
        }
    }
}

impl From<BetaSchedule> for String {
    fn from(b: BetaSchedule) -> Self {
        b.to_string()
    }
}
