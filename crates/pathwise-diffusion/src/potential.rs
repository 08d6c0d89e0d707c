//! Named 2-D potentials `V(x, y)` whose negative gradient is the drift.
//!
//! | Spec string                              | Potential                                 |
//! |------------------------------------------|-------------------------------------------|
//! | `double_well`                            | `(x² - 1)² + ½ y²`                        |
//! | `none`                                   | `0`                                       |
//! | `gmix:w=[..];mu=[x1,y1,..];sigma=[..]`   | `-log Σ w_k N((x,y); μ_k, σ_k² I)`        |
//!
//! Mixture weights default to `1/count` and widths to `0.6`.

use crate::error::DiffusionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT_MIXTURE_SIGMA: f64 = 0.6;

/// One isotropic Gaussian component of a mixture.
#[derive(Clone, Debug, PartialEq)]
pub struct MixtureComponent {
    /// Mixing weight (unnormalised, positive).
    pub weight: f64,
    /// Centre.
    pub mean: [f64; 2],
    /// Standard deviation.
    pub sigma: f64,
}

/// A drift-generating potential.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Potential {
    /// Symmetric double well along `x`, harmonic along `y`.
    #[default]
    DoubleWell,
    /// Zero potential (pure diffusion).
    None,
    /// Negative log of a Gaussian mixture density.
    GaussianMixture(Vec<MixtureComponent>),
}

impl Potential {
    /// `∇V(x, y)`.
    pub fn gradient(&self, x: f64, y: f64) -> [f64; 2] {
        match self {
            Self::DoubleWell => [4.0 * x * (x * x - 1.0), y],
            Self::None => [0.0, 0.0],
            Self::GaussianMixture(components) => mixture_gradient(components, x, y),
        }
    }

    /// `V(x, y)`.
    pub fn energy(&self, x: f64, y: f64) -> f64 {
        match self {
            Self::DoubleWell => (x * x - 1.0).powi(2) + 0.5 * y * y,
            Self::None => 0.0,
            Self::GaussianMixture(components) => -log_mixture(components, x, y).0,
        }
    }
}

/// `log Σ w_k N_k` plus each component's log-term, via log-sum-exp.
fn log_mixture(components: &[MixtureComponent], x: f64, y: f64) -> (f64, Vec<f64>) {
    let terms: Vec<f64> = components
        .iter()
        .map(|c| {
            let s2 = c.sigma * c.sigma;
            let d2 = (x - c.mean[0]).powi(2) + (y - c.mean[1]).powi(2);
            c.weight.ln() - (2.0 * std::f64::consts::PI * s2).ln() - d2 / (2.0 * s2)
        })
        .collect();
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = terms.iter().map(|t| (t - max).exp()).sum();
    (max + sum.ln(), terms)
}

fn mixture_gradient(components: &[MixtureComponent], x: f64, y: f64) -> [f64; 2] {
    let (log_total, terms) = log_mixture(components, x, y);
    let mut grad = [0.0; 2];
    for (c, t) in components.iter().zip(terms) {
        let r = (t - log_total).exp();
        let s2 = c.sigma * c.sigma;
        grad[0] += r * (x - c.mean[0]) / s2;
        grad[1] += r * (y - c.mean[1]) / s2;
    }
    grad
}

fn parse_list(text: &str, raw: &str) -> Result<Vec<f64>, DiffusionError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DiffusionError::UnknownPotential(text.to_string()))
        })
        .collect()
}

fn parse_mixture(text: &str, body: &str) -> Result<Potential, DiffusionError> {
    let bad = || DiffusionError::UnknownPotential(text.to_string());
    let (mut weights, mut means, mut sigmas) = (Vec::new(), Vec::new(), Vec::new());
    for part in body.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(bad)?;
        let values = parse_list(text, value)?;
        match key.trim() {
            "w" | "weights" => weights = values,
            "mu" | "mean" => means = values,
            "sigma" => sigmas = values,
            _ => return Err(bad()),
        }
    }
    let count = weights
        .len()
        .max(means.len().div_ceil(2))
        .max(sigmas.len());
    if count == 0 {
        return Err(bad());
    }
    let components: Vec<MixtureComponent> = (0..count)
        .map(|i| MixtureComponent {
            weight: weights.get(i).copied().unwrap_or(1.0 / count as f64),
            mean: [
                means.get(2 * i).copied().unwrap_or(0.0),
                means.get(2 * i + 1).copied().unwrap_or(0.0),
            ],
            sigma: sigmas.get(i).copied().unwrap_or(DEFAULT_MIXTURE_SIGMA),
        })
        .collect();
    if components.iter().any(|c| c.weight <= 0.0 || c.sigma <= 0.0) {
        return Err(bad());
    }
    Ok(Potential::GaussianMixture(components))
}

impl FromStr for Potential {
    type Err = DiffusionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim() {
            "double_well" => Ok(Self::DoubleWell),
            "none" => Ok(Self::None),
            t => match t.strip_prefix("gmix:") {
                Some(body) => parse_mixture(text, body),
                None => Err(DiffusionError::UnknownPotential(text.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Potential {
    type Error = DiffusionError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl fmt::Display for Potential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoubleWell => write!(f, "double_well"),
            Self::None => write!(f, "none"),
            Self::GaussianMixture(components) => {
                let join = |values: Vec<f64>| {
                    values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                };
                write!(
                    f,
                    "gmix:w=[{}];mu=[{}];sigma=[{}]",
                    join(components.iter().map(|c| c.weight).collect()),
                    join(components.iter().flat_map(|c| c.mean).collect()),
                    join(components.iter().map(|c| c.sigma).collect()),
                )
            }
        }
    }
}

impl From<Potential> for String {
    fn from(p: Potential) -> Self {
        p.to_string()
    }
}
