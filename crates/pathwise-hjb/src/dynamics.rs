//! Controlled dynamical systems `ẋ = f(x, u)`.
//!
//! Every model clips its control into the box given by
//! [`Dynamics::control_bounds`] before evaluating the rate, so solvers
//! and rollouts can hand any control vector to [`Dynamics::rate`].

use crate::error::HjbError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A controlled system with a box-bounded control space.
pub trait Dynamics: fmt::Debug + Send + Sync {
    /// Model name as it appears in configs.
    fn name(&self) -> &'static str;

    /// Length of the state vector.
    fn state_dim(&self) -> usize;

    /// Length of the control vector.
    fn control_dim(&self) -> usize;

    /// `(min, max)` for each control component.
    fn control_bounds(&self) -> &[(f64, f64)];

    /// Default spacing of the control lattice searched by the solvers.
    fn control_resolution(&self) -> f64;

    /// State derivative for `state` under `control` (clipped first).
    fn rate(&self, state: &[f64], control: &[f64]) -> Vec<f64>;

    /// `control` clipped component-wise into the bounds. Missing
    /// components are taken as zero.
    fn clip(&self, control: &[f64]) -> Vec<f64> {
        self.control_bounds()
            .iter()
            .enumerate()
            .map(|(i, &(lo, hi))| control.get(i).copied().unwrap_or(0.0).clamp(lo, hi))
            .collect()
    }
}

fn check_limit(name: &str, value: f64) -> Result<f64, HjbError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(HjbError::invalid(format!(
            "{name} must be finite and positive, got {value}"
        )))
    }
}

/// Point-mass integrator: `ẋ = clip(u)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SingleIntegrator {
    bounds: Vec<(f64, f64)>,
    resolution: f64,
}

impl SingleIntegrator {
    /// `dimension` state (and control) components, each control bounded
    /// by `±control_limit`.
    pub fn new(dimension: usize, control_limit: f64, resolution: f64) -> Result<Self, HjbError> {
        if dimension == 0 {
            return Err(HjbError::invalid("dimension must be at least 1"));
        }
        let limit = check_limit("controlLimit", control_limit)?;
        Ok(Self {
            bounds: vec![(-limit, limit); dimension],
            resolution: check_limit("controlResolution", resolution)?,
        })
    }
}

impl Dynamics for SingleIntegrator {
    fn name(&self) -> &'static str {
        "single_integrator"
    }

    fn state_dim(&self) -> usize {
        self.bounds.len()
    }

    fn control_dim(&self) -> usize {
        self.bounds.len()
    }

    fn control_bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    fn control_resolution(&self) -> f64 {
        self.resolution
    }

    fn rate(&self, _state: &[f64], control: &[f64]) -> Vec<f64> {
        self.clip(control)
    }
}

/// Damped double integrator. State is `[position; velocity]`, control is
/// an acceleration per position axis.
#[derive(Clone, Debug, PartialEq)]
pub struct DoubleIntegrator {
    bounds: Vec<(f64, f64)>,
    damping: f64,
    resolution: f64,
}

impl DoubleIntegrator {
    /// Create with `position_dimension` axes.
    pub fn new(
        position_dimension: usize,
        control_limit: f64,
        damping: f64,
        resolution: f64,
    ) -> Result<Self, HjbError> {
        if position_dimension == 0 {
            return Err(HjbError::invalid("dimension must be at least 1"));
        }
        if !damping.is_finite() || damping < 0.0 {
            return Err(HjbError::invalid(format!(
                "damping must be finite and non-negative, got {damping}"
            )));
        }
        let limit = check_limit("controlLimit", control_limit)?;
        Ok(Self {
            bounds: vec![(-limit, limit); position_dimension],
            damping,
            resolution: check_limit("controlResolution", resolution)?,
        })
    }
}

impl Dynamics for DoubleIntegrator {
    fn name(&self) -> &'static str {
        "double_integrator"
    }

    fn state_dim(&self) -> usize {
        2 * self.bounds.len()
    }

    fn control_dim(&self) -> usize {
        self.bounds.len()
    }

    fn control_bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    fn control_resolution(&self) -> f64 {
        self.resolution
    }

    fn rate(&self, state: &[f64], control: &[f64]) -> Vec<f64> {
        let p = self.bounds.len();
        let u = self.clip(control);
        let velocity = |i: usize| state.get(p + i).copied().unwrap_or(0.0);
        let mut rate = Vec::with_capacity(2 * p);
        rate.extend((0..p).map(velocity));
        rate.extend((0..p).map(|i| u[i] - self.damping * velocity(i)));
        rate
    }
}

/// Unicycle with fixed forward speed. State is `[x, y, θ]`, control is
/// the turn rate.
#[derive(Clone, Debug, PartialEq)]
pub struct DubinsCar {
    speed: f64,
    bounds: [(f64, f64); 1],
    resolution: f64,
}

impl DubinsCar {
    /// Create with forward `speed` and turn rate bounded by `±turn_rate`.
    pub fn new(speed: f64, turn_rate: f64, resolution: f64) -> Result<Self, HjbError> {
        if !speed.is_finite() {
            return Err(HjbError::invalid(format!("speed must be finite, got {speed}")));
        }
        let turn = check_limit("turnRate", turn_rate)?;
        Ok(Self {
            speed,
            bounds: [(-turn, turn)],
            resolution: check_limit("controlResolution", resolution)?,
        })
    }
}

impl Dynamics for DubinsCar {
    fn name(&self) -> &'static str {
        "dubins"
    }

    fn state_dim(&self) -> usize {
        3
    }

    fn control_dim(&self) -> usize {
        1
    }

    fn control_bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    fn control_resolution(&self) -> f64 {
        self.resolution
    }

    fn rate(&self, state: &[f64], control: &[f64]) -> Vec<f64> {
        let theta = state.get(2).copied().unwrap_or(0.0);
        let omega = self.clip(control)[0];
        vec![self.speed * theta.cos(), self.speed * theta.sin(), omega]
    }
}

/// Which solver family a [`DynamicsSpec`] is built for. The two families
/// use different defaults for the double integrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveMode {
    /// Continuous HJB PDE solve.
    Pde,
    /// Lattice MDP value iteration.
    Mdp,
}

/// Dynamics model selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsKind {
    /// [`SingleIntegrator`].
    #[default]
    SingleIntegrator,
    /// [`DoubleIntegrator`].
    DoubleIntegrator,
    /// [`DubinsCar`].
    #[serde(alias = "dubins_car")]
    Dubins,
}

/// Optional model parameters; unset fields take per-model defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DynamicsOptions {
    /// State dimension (position dimension for the double integrator).
    pub dimension: Option<usize>,
    /// Symmetric bound on each control component.
    pub control_limit: Option<f64>,
    /// Control lattice spacing.
    pub control_resolution: Option<f64>,
    /// Velocity damping (double integrator).
    pub damping: Option<f64>,
    /// Forward speed (Dubins).
    pub speed: Option<f64>,
    /// Turn-rate bound (Dubins).
    pub turn_rate: Option<f64>,
}

/// Serializable dynamics description: `{"type": "...", "options": {...}}`.
///
/// # Examples
///
/// ```
/// use pathwise_hjb::{DynamicsSpec, SolveMode};
///
/// let spec: DynamicsSpec = serde_json::from_str(
///     r#"{"type": "single_integrator", "options": {"dimension": 2, "controlLimit": 5}}"#,
/// ).unwrap();
/// let dynamics = spec.build(SolveMode::Pde).unwrap();
/// assert_eq!(dynamics.rate(&[0.0, 0.0], &[9.0, -1.0]), vec![5.0, -1.0]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicsSpec {
    /// Model selector.
    #[serde(rename = "type")]
    pub kind: DynamicsKind,
    /// Model parameters.
    #[serde(default)]
    pub options: DynamicsOptions,
}

impl DynamicsSpec {
    /// Validate the parameters and build the model.
    pub fn build(&self, mode: SolveMode) -> Result<Box<dyn Dynamics>, HjbError> {
        let o = &self.options;
        Ok(match self.kind {
            DynamicsKind::SingleIntegrator => Box::new(SingleIntegrator::new(
                o.dimension.unwrap_or(2),
                o.control_limit.unwrap_or(3.0),
                o.control_resolution.unwrap_or(0.5),
            )?),
            DynamicsKind::DoubleIntegrator => {
                let (dim, limit, damping) = match mode {
                    SolveMode::Pde => (2, 3.0, 0.2),
                    SolveMode::Mdp => (1, 2.0, 0.1),
                };
                Box::new(DoubleIntegrator::new(
                    o.dimension.unwrap_or(dim),
                    o.control_limit.unwrap_or(limit),
                    o.damping.unwrap_or(damping),
                    o.control_resolution.unwrap_or(0.5),
                )?)
            }
            DynamicsKind::Dubins => Box::new(DubinsCar::new(
                o.speed.unwrap_or(1.0),
                o.turn_rate.unwrap_or(1.0),
                o.control_resolution.unwrap_or(0.25),
            )?),
        })
    }
}

fn lattice_step(dynamics: &dyn Dynamics, resolution: Option<f64>) -> f64 {
    resolution
        .filter(|r| r.is_finite())
        .unwrap_or_else(|| dynamics.control_resolution())
        .max(0.1)
}

/// Intervals on one control axis; the float-to-int cast saturates.
fn axis_intervals(lo: f64, hi: f64, step: f64) -> usize {
    (((hi - lo) / step).ceil() as usize).max(1)
}

/// Number of controls [`enumerate_controls`] would return, saturating at
/// `usize::MAX`. Computed without allocating the lattice.
pub fn control_lattice_size(dynamics: &dyn Dynamics, resolution: Option<f64>) -> usize {
    let step = lattice_step(dynamics, resolution);
    dynamics
        .control_bounds()
        .iter()
        .map(|&(lo, hi)| match axis_intervals(lo, hi, step) {
            1 => 1,
            samples => samples.saturating_add(1),
        })
        .fold(1_usize, usize::saturating_mul)
}

/// Regular lattice over the control box of `dynamics`.
///
/// Each axis gets `samples = max(1, ceil(width / max(resolution, 0.1)))`
/// intervals, i.e. `samples + 1` points including both bounds. When an
/// axis resolves to a single interval only the clipped zero control is
/// used on it. Controls are returned in row-major order, last axis
/// fastest. `resolution` defaults to the model's own.
///
/// Allocates the whole lattice; size it with [`control_lattice_size`]
/// first when the bounds come from untrusted input.
pub fn enumerate_controls(dynamics: &dyn Dynamics, resolution: Option<f64>) -> Vec<Vec<f64>> {
    let step = lattice_step(dynamics, resolution);
    let axes: Vec<Vec<f64>> = dynamics
        .control_bounds()
        .iter()
        .map(|&(lo, hi)| {
            let samples = axis_intervals(lo, hi, step);
            if samples == 1 {
                vec![0.0_f64.clamp(lo, hi)]
            } else {
                let width = hi - lo;
                (0..=samples)
                    .map(|k| lo + width * k as f64 / samples as f64)
                    .collect()
            }
        })
        .collect();

    let mut controls = vec![Vec::with_capacity(axes.len())];
    for axis in &axes {
        controls = controls
            .into_iter()
            .flat_map(|prefix| {
                axis.iter().map(move |&u| {
                    let mut next = prefix.clone();
                    next.push(u);
                    next
                })
            })
            .collect();
    }
    controls
}
