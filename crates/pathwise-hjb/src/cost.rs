//! Running-cost models `L(x, u)`.

use crate::error::HjbError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage (running) cost.
pub trait CostModel: fmt::Debug + Send + Sync {
    /// Cost rate at `state` under `control`.
    fn stage(&self, state: &[f64], control: &[f64]) -> f64;
}

/// `Σ w_i (x_i - g_i)² + Σ r_i u_i²`.
///
/// Components beyond the supplied weights contribute nothing; a missing
/// goal is the origin.
///
/// # Examples
///
/// ```
/// use pathwise_hjb::{CostModel, QuadraticCost};
///
/// let cost = QuadraticCost::new(vec![1.0, 1.0], vec![1.0, 1.0], None).unwrap();
/// assert_eq!(cost.stage(&[1.0, -1.0], &[-1.0, 1.0]), 4.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct QuadraticCost {
    state_weights: Vec<f64>,
    control_weights: Vec<f64>,
    goal: Vec<f64>,
}

fn check_weights(name: &str, weights: &[f64]) -> Result<(), HjbError> {
    match weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        Some(w) => Err(HjbError::invalid(format!(
            "{name} must be finite and non-negative, got {w}"
        ))),
        None => Ok(()),
    }
}

impl QuadraticCost {
    /// Validate weights (finite, non-negative) and goal (finite).
    pub fn new(
        state_weights: Vec<f64>,
        control_weights: Vec<f64>,
        goal: Option<Vec<f64>>,
    ) -> Result<Self, HjbError> {
        check_weights("stateWeights", &state_weights)?;
        check_weights("controlWeights", &control_weights)?;
        let goal = goal.unwrap_or_default();
        if goal.iter().any(|g| !g.is_finite()) {
            return Err(HjbError::invalid("goal must be finite"));
        }
        Ok(Self {
            state_weights,
            control_weights,
            goal,
        })
    }
}

impl CostModel for QuadraticCost {
    fn stage(&self, state: &[f64], control: &[f64]) -> f64 {
        let state_term: f64 = self
            .state_weights
            .iter()
            .zip(state)
            .enumerate()
            .map(|(i, (w, x))| {
                let d = x - self.goal.get(i).copied().unwrap_or(0.0);
                w * d * d
            })
            .sum();
        let control_term: f64 = self
            .control_weights
            .iter()
            .zip(control)
            .map(|(r, u)| r * u * u)
            .sum();
        state_term + control_term
    }
}

/// A circular (spherical) penalty region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Centre, compared against the leading state components.
    pub center: Vec<f64>,
    /// Radius of influence.
    pub radius: f64,
    /// Penalty scale.
    pub weight: f64,
}

/// A base cost plus `weight · (radius - d)²` for every obstacle whose
/// centre lies within `radius` of the state.
#[derive(Debug)]
pub struct ObstacleCost {
    base: Box<dyn CostModel>,
    obstacles: Vec<Obstacle>,
}

impl ObstacleCost {
    /// Wrap `base`, validating every obstacle.
    pub fn new(base: Box<dyn CostModel>, obstacles: Vec<Obstacle>) -> Result<Self, HjbError> {
        for (i, o) in obstacles.iter().enumerate() {
            if o.center.is_empty() || o.center.iter().any(|c| !c.is_finite()) {
                return Err(HjbError::invalid(format!(
                    "obstacle {i} centre must be non-empty and finite"
                )));
            }
            if !o.radius.is_finite() || o.radius <= 0.0 {
                return Err(HjbError::invalid(format!(
                    "obstacle {i} radius must be finite and positive"
                )));
            }
            if !o.weight.is_finite() || o.weight < 0.0 {
                return Err(HjbError::invalid(format!(
                    "obstacle {i} weight must be finite and non-negative"
                )));
            }
        }
        Ok(Self { base, obstacles })
    }
}

impl CostModel for ObstacleCost {
    fn stage(&self, state: &[f64], control: &[f64]) -> f64 {
        let penalty: f64 = self
            .obstacles
            .iter()
            .map(|o| {
                let d = o
                    .center
                    .iter()
                    .zip(state)
                    .map(|(c, x)| (x - c) * (x - c))
                    .sum::<f64>()
                    .sqrt();
                if d < o.radius {
                    o.weight * (o.radius - d).powi(2)
                } else {
                    0.0
                }
            })
            .sum();
        self.base.stage(state, control) + penalty
    }
}

/// Cost model selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    /// [`QuadraticCost`] alone.
    #[default]
    Quadratic,
    /// [`QuadraticCost`] wrapped in an [`ObstacleCost`].
    QuadraticWithObstacles,
}

fn unit_weights() -> Vec<f64> {
    vec![1.0, 1.0]
}

/// Serializable cost description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSpec {
    /// Model selector.
    #[serde(rename = "type", default)]
    pub kind: CostKind,
    /// State weights, default `[1, 1]`.
    #[serde(default = "unit_weights")]
    pub state_weights: Vec<f64>,
    /// Control weights, default `[1, 1]`.
    #[serde(default = "unit_weights")]
    pub control_weights: Vec<f64>,
    /// Target state; the origin when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Vec<f64>>,
    /// Penalty regions (`quadratic_with_obstacles` only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<Obstacle>,
}

impl Default for CostSpec {
    fn default() -> Self {
        Self {
            kind: CostKind::Quadratic,
            state_weights: unit_weights(),
            control_weights: unit_weights(),
            goal: None,
            obstacles: Vec::new(),
        }
    }
}

impl CostSpec {
    /// Validate and build the model.
    pub fn build(&self) -> Result<Box<dyn CostModel>, HjbError> {
        let base = QuadraticCost::new(
            self.state_weights.clone(),
            self.control_weights.clone(),
            self.goal.clone(),
        )?;
        match self.kind {
            CostKind::Quadratic if !self.obstacles.is_empty() => Err(HjbError::invalid(
                "obstacles require cost type quadratic_with_obstacles",
            )),
            CostKind::Quadratic => Ok(Box::new(base)),
            CostKind::QuadraticWithObstacles => Ok(Box::new(ObstacleCost::new(
                Box::new(base),
                self.obstacles.clone(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_respects_goal_and_short_weights() {
        let cost = QuadraticCost::new(vec![2.0], vec![], Some(vec![1.0, 5.0])).unwrap();
        // Only the first state component is weighted; controls are free.
        assert_eq!(cost.stage(&[3.0, 100.0], &[7.0]), 8.0);
    }

    #[test]
    fn negative_weight_rejected() {
        assert!(QuadraticCost::new(vec![-1.0], vec![], None).is_err());
        assert!(QuadraticCost::new(vec![1.0], vec![f64::INFINITY], None).is_err());
    }

    #[test]
    fn obstacle_penalises_inside_radius_only() {
        let base = QuadraticCost::new(vec![], vec![], None).unwrap();
        let cost = ObstacleCost::new(
            Box::new(base),
            vec![Obstacle {
                center: vec![0.0, 0.0],
                radius: 1.0,
                weight: 4.0,
            }],
        )
        .unwrap();
        assert_eq!(cost.stage(&[0.0, 0.0], &[]), 4.0);
        assert_eq!(cost.stage(&[0.5, 0.0], &[]), 1.0);
        assert_eq!(cost.stage(&[2.0, 0.0], &[]), 0.0);
    }

    #[test]
    fn spec_defaults_to_unit_quadratic() {
        let spec: CostSpec = serde_json::from_str(r#"{"type": "quadratic"}"#).unwrap();
        assert_eq!(spec, CostSpec::default());
        let cost = spec.build().unwrap();
        assert_eq!(cost.stage(&[1.0, 1.0], &[1.0, 0.0]), 3.0);
    }

    #[test]
    fn obstacles_need_obstacle_type() {
        let spec: CostSpec = serde_json::from_str(
            r#"{"type": "quadratic", "obstacles": [{"center": [0, 0], "radius": 1, "weight": 1}]}"#,
        )
        .unwrap();
        assert!(spec.build().is_err());
    }
}
