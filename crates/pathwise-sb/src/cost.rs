//! Ground cost between source and target points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SinkhornError;
use crate::marginal::Marginal;

/// Pairwise ground cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostMetric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// Manhattan distance.
    L1,
    /// `1 - cos(x, y)`; a zero vector has similarity 0 with everything.
    Cosine,
}

impl CostMetric {
    /// Cost between two points of equal dimension.
    pub fn eval(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            Self::L2 => x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum(),
            Self::L1 => x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum(),
            Self::Cosine => {
                let dot: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
                let nx = x.iter().map(|a| a * a).sum::<f64>().sqrt();
                let ny = y.iter().map(|b| b * b).sum::<f64>().sqrt();
                if nx == 0.0 || ny == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (nx * ny)
                }
            }
        }
    }
}

impl FromStr for CostMetric {
    type Err = SinkhornError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l2" => Ok(Self::L2),
            "l1" => Ok(Self::L1),
            "cosine" => Ok(Self::Cosine),
            other => Err(SinkhornError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for CostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::L2 => "l2",
            Self::L1 => "l1",
            Self::Cosine => "cosine",
        })
    }
}

/// Dense row-major `source.len() x target.len()` cost matrix.
pub fn cost_matrix(
    source: &Marginal,
    target: &Marginal,
    metric: CostMetric,
) -> Result<Vec<f64>, SinkhornError> {
    if source.dim() != target.dim() {
        return Err(SinkhornError::DimensionMismatch {
            what: "target point dimension",
            expected: source.dim(),
            actual: target.dim(),
        });
    }
    let mut cost = Vec::with_capacity(source.len() * target.len());
    for x in source.points() {
        cost.extend(target.points().iter().map(|y| metric.eval(x, y)));
    }
    Ok(cost)
}
