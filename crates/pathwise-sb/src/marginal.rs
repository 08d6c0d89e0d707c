//! Marginal measures: parsing named distributions into weighted point sets.
//!
//! Three textual forms are accepted:
//!
//! | Form | Example | Points |
//! |------|---------|--------|
//! | `gaussian:<mean,...>:<std>[:<n>]` | `gaussian:-2,0:0.3:32` | `n` samples (default 64) |
//! | `uniform:<lo>:<hi>[:<n>]` | `uniform:0:1:16` | `n` evenly spaced 1-D points |
//! | inline JSON | `{"points": [[0],[1]], "weights": [1,3]}` | as given |
//!
//! Gaussian samples come from a [`DeterministicRng`] seeded with the
//! spec text itself, so the same string always yields the same cloud.

use pathwise_core::{seed_from_str, DeterministicRng};
use serde::Deserialize;

use crate::error::SinkhornError;

/// Default sample count for named distributions.
const DEFAULT_POINTS: usize = 64;

/// Largest sample count a named distribution may request.
pub const MAX_POINTS: usize = 1 << 20;

/// Longest spec prefix echoed back in error messages.
const ECHO_LIMIT: usize = 48;

/// A parsed marginal description, before sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum MarginalSpec {
    /// Isotropic Gaussian sampled `count` times.
    Gaussian {
        /// Mean vector; its length sets the dimension.
        mean: Vec<f64>,
        /// Standard deviation on every axis.
        std: f64,
        /// Number of samples.
        count: usize,
    },
    /// Evenly spaced points on `[lo, hi]`.
    Uniform {
        /// Left end.
        lo: f64,
        /// Right end.
        hi: f64,
        /// Number of points.
        count: usize,
    },
    /// Points and weights supplied verbatim.
    Explicit {
        /// Support points, all of the same dimension.
        points: Vec<Vec<f64>>,
        /// Non-negative weights, one per point.
        weights: Vec<f64>,
    },
}

/// A discrete probability measure: support points with unit-sum weights.
#[derive(Clone, Debug, PartialEq)]
pub struct Marginal {
    points: Vec<Vec<f64>>,
    weights: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InlineMarginal {
    points: Vec<Vec<f64>>,
    #[serde(default)]
    weights: Option<Vec<f64>>,
}

fn echo(spec: &str) -> String {
    match spec.char_indices().nth(ECHO_LIMIT) {
        Some((cut, _)) => format!("{}...", &spec[..cut]),
        None => spec.to_string(),
    }
}

fn invalid(spec: &str, reason: impl Into<String>) -> SinkhornError {
    SinkhornError::InvalidMarginal {
        spec: echo(spec),
        reason: reason.into(),
    }
}

fn number(spec: &str, field: &str, raw: &str) -> Result<f64, SinkhornError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(spec, format!("{field} '{raw}' is not a finite number")))
}

fn count(spec: &str, raw: Option<&str>) -> Result<usize, SinkhornError> {
    match raw {
        None => Ok(DEFAULT_POINTS),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(invalid(
                spec,
                format!("point count '{raw}' must be a positive integer"),
            )),
            Ok(n) if n > MAX_POINTS => Err(invalid(
                spec,
                format!("point count {n} exceeds the limit of {MAX_POINTS}"),
            )),
            Ok(n) => Ok(n),
        },
    }
}

impl MarginalSpec {
    /// Parse one of the accepted textual forms.
    pub fn parse(text: &str) -> Result<Self, SinkhornError> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            let inline: InlineMarginal = serde_json::from_str(trimmed)
                .map_err(|e| invalid(text, format!("inline JSON: {e}")))?;
            let weights = inline
                .weights
                .unwrap_or_else(|| vec![1.0; inline.points.len()]);
            return Ok(Self::Explicit {
                points: inline.points,
                weights,
            });
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            ["gaussian", mean, std, rest @ ..] if rest.len() <= 1 => {
                let mean = mean
                    .split(',')
                    .map(|m| number(text, "mean", m))
                    .collect::<Result<Vec<_>, _>>()?;
                let std = number(text, "std", std)?;
                if std < 0.0 {
                    return Err(invalid(text, "std must be non-negative"));
                }
                Ok(Self::Gaussian {
                    mean,
                    std,
                    count: count(text, rest.first().copied())?,
                })
            }
            ["uniform", lo, hi, rest @ ..] if rest.len() <= 1 => {
                let lo = number(text, "lo", lo)?;
                let hi = number(text, "hi", hi)?;
                if hi < lo {
                    return Err(invalid(text, "hi must not be below lo"));
                }
                Ok(Self::Uniform {
                    lo,
                    hi,
                    count: count(text, rest.first().copied())?,
                })
            }
            [kind, ..] if *kind == "gaussian" || *kind == "uniform" => Err(invalid(
                text,
                format!("wrong number of fields for '{kind}'"),
            )),
            _ => Err(invalid(
                text,
                "expected 'gaussian:...', 'uniform:...' or an inline JSON object",
            )),
        }
    }

    /// Number of support points the measure will have.
    pub fn len(&self) -> usize {
        match self {
            Self::Gaussian { count, .. } | Self::Uniform { count, .. } => *count,
            Self::Explicit { points, .. } => points.len(),
        }
    }

    /// Whether the measure has no support points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialise the measure. `source` is the original text, used as
    /// the sampling seed for Gaussian specs.
    pub fn realise(self, source: &str) -> Result<Marginal, SinkhornError> {
        match self {
            Self::Gaussian { mean, std, count } => {
                let mut rng = DeterministicRng::new(seed_from_str(source));
                let points = (0..count)
                    .map(|_| mean.iter().map(|m| m + std * rng.next_gaussian()).collect())
                    .collect();
                Marginal::new(points, vec![1.0; count])
            }
            Self::Uniform { lo, hi, count } => {
                let points = (0..count)
                    .map(|k| {
                        if count == 1 {
                            vec![0.5 * (lo + hi)]
                        } else {
                            vec![lo + (hi - lo) * k as f64 / (count - 1) as f64]
                        }
                    })
                    .collect();
                Marginal::new(points, vec![1.0; count])
            }
            Self::Explicit { points, weights } => Marginal::new(points, weights),
        }
        .map_err(|e| match e {
            SinkhornError::InvalidMarginal { reason, .. } => invalid(source, reason),
            other => other,
        })
    }
}

impl Marginal {
    /// Parse and materialise in one step.
    pub fn parse(text: &str) -> Result<Self, SinkhornError> {
        MarginalSpec::parse(text)?.realise(text)
    }

    /// Validate `points`/`weights` and normalise the weights to unit sum.
    pub fn new(points: Vec<Vec<f64>>, weights: Vec<f64>) -> Result<Self, SinkhornError> {
        let bad = |reason: String| SinkhornError::InvalidMarginal {
            spec: String::from("<explicit>"),
            reason,
        };
        let first = points
            .first()
            .ok_or_else(|| bad("marginal has no points".into()))?;
        let dim = first.len();
        if dim == 0 {
            return Err(bad("points must have at least one coordinate".into()));
        }
        if weights.len() != points.len() {
            return Err(bad(format!(
                "{} weights for {} points",
                weights.len(),
                points.len()
            )));
        }
        if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| p.len() != dim) {
            return Err(bad(format!(
                "point {i} has {} coordinates, expected {dim}",
                p.len()
            )));
        }
        if points.iter().flatten().any(|c| !c.is_finite()) {
            return Err(bad("point coordinates must be finite".into()));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(bad(format!("weight {w} is negative or not finite")));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(bad("weights must have a positive finite sum".into()));
        }
        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self { points, weights })
    }

    /// Support points.
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Unit-sum weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of support points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coordinates per point.
    pub fn dim(&self) -> usize {
        self.points.first().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_spec_parses_with_default_count() {
        let spec = MarginalSpec::parse("gaussian:-2,0:0.5").unwrap();
        assert_eq!(
            spec,
            MarginalSpec::Gaussian {
                mean: vec![-2.0, 0.0],
                std: 0.5,
                count: 64
            }
        );
    }

    #[test]
    fn gaussian_samples_are_seeded_by_text() {
        let a = Marginal::parse("gaussian:0:1:16").unwrap();
        let b = Marginal::parse("gaussian:0:1:16").unwrap();
        let c = Marginal::parse("gaussian:0:1.0:16").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.points(), c.points());
        assert_eq!(a.dim(), 1);
        assert!((a.weights().iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn oversized_point_count_is_rejected_while_parsing() {
        let err = MarginalSpec::parse("uniform:0:1:100000000000000").unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"), "{err}");
        assert!(Marginal::parse("gaussian:0:1:99999999999").is_err());
        let at_limit = format!("uniform:0:1:{MAX_POINTS}");
        assert_eq!(MarginalSpec::parse(&at_limit).unwrap().len(), MAX_POINTS);
    }

    #[test]
    fn point_count_is_known_before_sampling() {
        assert_eq!(MarginalSpec::parse("gaussian:0,0:1").unwrap().len(), 64);
        assert_eq!(MarginalSpec::parse("uniform:0:1:7").unwrap().len(), 7);
        let inline = MarginalSpec::parse(r#"{"points": [[0], [1], [2]]}"#).unwrap();
        assert_eq!(inline.len(), 3);
    }

    #[test]
    fn uniform_is_evenly_spaced() {
        let m = Marginal::parse("uniform:0:1:5").unwrap();
        let xs: Vec<f64> = m.points().iter().map(|p| p[0]).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(m.weights().iter().all(|w| (w - 0.2).abs() < 1e-15));
    }

    #[test]
    fn single_uniform_point_sits_at_midpoint() {
        let m = Marginal::parse("uniform:2:4:1").unwrap();
        assert_eq!(m.points(), &[vec![3.0]]);
    }

    #[test]
    fn inline_json_weights_are_normalised() {
        let m = Marginal::parse(r#"{"points": [[0, 0], [1, 1]], "weights": [1, 3]}"#).unwrap();
        assert_eq!(m.weights(), &[0.25, 0.75]);
        assert_eq!(m.dim(), 2);
    }

    #[test]
    fn inline_json_without_weights_is_uniform() {
        let m = Marginal::parse(r#"{"points": [[0], [1]]}"#).unwrap();
        assert_eq!(m.weights(), &[0.5, 0.5]);
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for bad in [
            "",
            "laplace:0:1",
            "gaussian:0",
            "gaussian:0:-1",
            "gaussian:a:1",
            "uniform:1:0",
            "uniform:0:1:0",
            "gaussian:0:1:8:9",
            r#"{"points": []}"#,
            r#"{"points": [[0], [1, 2]]}"#,
            r#"{"points": [[0]], "weights": [-1]}"#,
            r#"{"points": [[0], [1]], "weights": [1]}"#,
            r#"{"points": [[0]], "weights": [0]}"#,
        ] {
            assert!(
                matches!(Marginal::parse(bad), Err(SinkhornError::InvalidMarginal { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn long_specs_are_truncated_in_errors() {
        let long = format!("{{\"points\": [[0], [1, 2]], \"pad\": \"{}\"}}", "x".repeat(100));
        match Marginal::parse(&long) {
            Err(SinkhornError::InvalidMarginal { spec, .. }) => assert!(spec.ends_with("...")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
