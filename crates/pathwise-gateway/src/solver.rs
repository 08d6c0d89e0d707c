//! Typed solver configs and the work they turn into.
//!
//! The wire carries configs as opaque JSON. At the boundary each one is
//! parsed into its typed form ([`SolverConfig`]) and then *prepared*:
//! every grid, model, and marginal is built and range-checked before a
//! job exists. A config that fails here never produces a job.
//!
//! [`PreparedJob::run`] is the CPU-bound part executed on a solver
//! thread. It returns metrics, artifacts, and any payload kept for
//! follow-up requests.

use pathwise_artifact::{
    encode_coupling, encode_density_frame, encode_frames, encode_metrics, encode_particles,
    encode_policy_csv, encode_rollout, encode_value_csv, Artifact,
};
use pathwise_core::{Boundary, CancelToken, Grid, GridSpec};
use pathwise_diffusion::{run_euler_maruyama, run_fokker_planck, FokkerPlanckConfig, SdeConfig};
use pathwise_hjb::{
    control_lattice_size, solve_stationary, solve_time_dependent, CostModel, CostSpec, Dynamics,
    DynamicsSpec, GridPolicy, HjbError, HjbSolution, LatticeMdp, MdpOptions, Rollout, RolloutTrace,
    SolveMode, StationaryOptions, TimeDependentOptions,
};
use pathwise_sb::{
    cost_matrix, interpolate, log_sinkhorn, CostMetric, Marginal, MarginalSpec, SinkhornConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::job::JobKind;
use crate::store::{HjbPayload, JobPayload, SbPayload};

const DEFAULT_ROLLOUT_STEPS: usize = 100;
const DEFAULT_ROLLOUT_DT: f64 = 0.05;

fn default_rollout_steps() -> usize {
    DEFAULT_ROLLOUT_STEPS
}

fn default_rollout_dt() -> f64 {
    DEFAULT_ROLLOUT_DT
}

fn default_mdp_discount() -> f64 {
    0.95
}

fn default_mdp_dt() -> f64 {
    0.1
}

fn default_sb_iters() -> usize {
    500
}

fn default_sb_tol() -> f64 {
    1e-3
}

/// A closed-loop simulation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RolloutRequest {
    /// Initial state.
    pub start: Vec<f64>,
    /// Euler steps.
    #[serde(default = "default_rollout_steps")]
    pub steps: usize,
    /// Step size.
    #[serde(default = "default_rollout_dt")]
    pub dt: f64,
}

impl RolloutRequest {
    /// Request with the default step count and size.
    pub fn new(start: Vec<f64>) -> Self {
        Self {
            start,
            steps: DEFAULT_ROLLOUT_STEPS,
            dt: DEFAULT_ROLLOUT_DT,
        }
    }

    pub(crate) fn check(&self, state_dim: usize, max_steps: usize) -> Result<(), GatewayError> {
        if self.start.len() != state_dim {
            return Err(GatewayError::Validation(format!(
                "rollout start has {} entries, dynamics state has {state_dim}",
                self.start.len()
            )));
        }
        if self.start.iter().any(|x| !x.is_finite()) {
            return Err(GatewayError::validation("rollout start must be finite"));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(GatewayError::Validation(format!(
                "rollout dt must be finite and positive, got {}",
                self.dt
            )));
        }
        if self.steps == 0 {
            return Err(GatewayError::validation("rollout steps must be at least 1"));
        }
        check_steps("rollout", self.steps, max_steps)
    }
}

/// `hjbSolvePDE` input. A positive `horizon` selects the
/// time-dependent solver; otherwise the stationary one runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HjbPdeConfig {
    /// Lattice.
    pub grid: GridSpec,
    /// Dynamics model.
    pub dynamics: DynamicsSpec,
    /// Running cost.
    pub cost: CostSpec,
    /// Edge policy.
    #[serde(default)]
    pub boundary: Boundary,
    /// Finite horizon.
    pub horizon: Option<f64>,
    /// Outer step of the time-dependent solver.
    pub time_step: Option<f64>,
    /// Residual threshold.
    pub tolerance: Option<f64>,
    /// Pseudo-time damping of the stationary solver.
    pub damping: Option<f64>,
    /// Discount rate of the stationary solver.
    pub discount: Option<f64>,
    /// Sweep budget of the stationary solver.
    pub max_iterations: Option<usize>,
    /// Control lattice spacing.
    pub control_resolution: Option<f64>,
    /// Simulate the solved policy inside the job.
    pub rollout: Option<RolloutRequest>,
}

/// `hjbSolveMDP` input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HjbMdpConfig {
    /// Lattice.
    pub grid: GridSpec,
    /// Dynamics model.
    pub dynamics: DynamicsSpec,
    /// Running cost.
    pub cost: CostSpec,
    /// Discount factor in `(0, 1)`.
    #[serde(default = "default_mdp_discount")]
    pub discount: f64,
    /// Transition time step.
    #[serde(default = "default_mdp_dt")]
    pub dt: f64,
    /// Value-iteration threshold.
    pub tolerance: Option<f64>,
    /// Sweep budget.
    pub max_iterations: Option<usize>,
    /// Control lattice spacing.
    pub control_resolution: Option<f64>,
}

/// `sbRun` input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SbConfig {
    /// Source marginal spec.
    pub mu: String,
    /// Target marginal spec.
    pub nu: String,
    /// Entropic regularisation.
    pub eps: f64,
    /// Iteration cap.
    #[serde(default = "default_sb_iters")]
    pub iters: usize,
    /// Marginal-error tolerance.
    #[serde(default = "default_sb_tol")]
    pub tol: f64,
    /// Ground cost.
    #[serde(default)]
    pub cost: CostMetric,
}

/// Every config the gateway accepts, tagged by job kind.
///
/// Serialized as `{"kind": "hjb.pde", "config": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config")]
pub enum SolverConfig {
    /// HJB PDE.
    #[serde(rename = "hjb.pde")]
    HjbPde(HjbPdeConfig),
    /// Lattice MDP.
    #[serde(rename = "hjb.mdp")]
    HjbMdp(HjbMdpConfig),
    /// Sinkhorn bridge.
    #[serde(rename = "sb")]
    Sb(SbConfig),
    /// Fokker-Planck.
    #[serde(rename = "diffusion.fp")]
    DiffusionFp(FokkerPlanckConfig),
    /// Euler-Maruyama.
    #[serde(rename = "diffusion.sde")]
    DiffusionSde(SdeConfig),
}

fn parse<T: serde::de::DeserializeOwned>(raw: &Value) -> Result<T, GatewayError> {
    serde_json::from_value(raw.clone()).map_err(GatewayError::validation)
}

fn check_budget(what: &str, cells: usize, limits: &GatewayConfig) -> Result<(), GatewayError> {
    if cells > limits.max_grid_cells {
        return Err(GatewayError::Validation(format!(
            "{what} has {cells} cells, limit is {}",
            limits.max_grid_cells
        )));
    }
    Ok(())
}

fn check_steps(what: &str, steps: usize, max_steps: usize) -> Result<(), GatewayError> {
    if steps > max_steps {
        return Err(GatewayError::Validation(format!(
            "{what} requests {steps} steps, limit is {max_steps}"
        )));
    }
    Ok(())
}

struct ControlProblem {
    grid: Grid,
    dynamics: Box<dyn Dynamics>,
    cost: Box<dyn CostModel>,
}

fn build_problem(
    grid: &GridSpec,
    dynamics: &DynamicsSpec,
    cost: &CostSpec,
    mode: SolveMode,
    control_resolution: Option<f64>,
    limits: &GatewayConfig,
) -> Result<ControlProblem, GatewayError> {
    let grid = grid.build().map_err(GatewayError::validation)?;
    check_budget("grid", grid.len(), limits)?;
    let dynamics = dynamics.build(mode).map_err(GatewayError::validation)?;
    if dynamics.state_dim() != grid.ndim() {
        return Err(GatewayError::Validation(format!(
            "{} dynamics have {} state dimensions, grid has {}",
            dynamics.name(),
            dynamics.state_dim(),
            grid.ndim()
        )));
    }
    // Sized before anything enumerates the lattice.
    let controls = control_lattice_size(dynamics.as_ref(), control_resolution);
    if controls > limits.max_controls {
        return Err(GatewayError::Validation(format!(
            "control lattice has {controls} points, limit is {}",
            limits.max_controls
        )));
    }
    check_budget("state-control table", grid.len().saturating_mul(controls), limits)?;
    let cost = cost.build().map_err(GatewayError::validation)?;
    Ok(ControlProblem {
        grid,
        dynamics,
        cost,
    })
}

impl SolverConfig {
    /// Parse the opaque JSON submitted for `kind`.
    pub fn from_json(kind: JobKind, raw: &Value) -> Result<Self, GatewayError> {
        Ok(match kind {
            JobKind::HjbPde => Self::HjbPde(parse(raw)?),
            JobKind::HjbMdp => Self::HjbMdp(parse(raw)?),
            JobKind::Sb => Self::Sb(parse(raw)?),
            JobKind::DiffusionFp => Self::DiffusionFp(parse(raw)?),
            JobKind::DiffusionSde => Self::DiffusionSde(parse(raw)?),
        })
    }

    /// Job kind this config produces.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::HjbPde(_) => JobKind::HjbPde,
            Self::HjbMdp(_) => JobKind::HjbMdp,
            Self::Sb(_) => JobKind::Sb,
            Self::DiffusionFp(_) => JobKind::DiffusionFp,
            Self::DiffusionSde(_) => JobKind::DiffusionSde,
        }
    }

    /// The untagged config, as a resolver would receive it.
    pub fn to_json(&self) -> Result<Value, GatewayError> {
        let value = match self {
            Self::HjbPde(c) => serde_json::to_value(c),
            Self::HjbMdp(c) => serde_json::to_value(c),
            Self::Sb(c) => serde_json::to_value(c),
            Self::DiffusionFp(c) => serde_json::to_value(c),
            Self::DiffusionSde(c) => serde_json::to_value(c),
        };
        value.map_err(GatewayError::validation)
    }

    /// Build and range-check everything the solve needs.
    pub fn prepare(&self, limits: &GatewayConfig) -> Result<PreparedJob, GatewayError> {
        let work = match self {
            Self::HjbPde(c) => {
                let problem = build_problem(
                    &c.grid,
                    &c.dynamics,
                    &c.cost,
                    SolveMode::Pde,
                    c.control_resolution,
                    limits,
                )?;
                c.boundary
                    .check(&problem.grid)
                    .map_err(GatewayError::validation)?;
                let mode = match c.horizon {
                    Some(horizon) => {
                        let defaults = TimeDependentOptions::default();
                        let options = TimeDependentOptions {
                            horizon,
                            time_step: c.time_step.unwrap_or(defaults.time_step),
                            tolerance: c.tolerance.unwrap_or(defaults.tolerance),
                            boundary: c.boundary.clone(),
                            control_resolution: c.control_resolution,
                        };
                        options.validate().map_err(GatewayError::validation)?;
                        PdeMode::TimeDependent(options)
                    }
                    None => {
                        let defaults = StationaryOptions::default();
                        let options = StationaryOptions {
                            discount: c.discount.unwrap_or(defaults.discount),
                            tolerance: c.tolerance.unwrap_or(defaults.tolerance),
                            damping: c.damping.unwrap_or(defaults.damping),
                            max_iterations: c.max_iterations.unwrap_or(defaults.max_iterations),
                            boundary: c.boundary.clone(),
                            control_resolution: c.control_resolution,
                        };
                        options.validate().map_err(GatewayError::validation)?;
                        PdeMode::Stationary(options)
                    }
                };
                if let Some(rollout) = &c.rollout {
                    rollout.check(problem.dynamics.state_dim(), limits.max_steps)?;
                }
                Work::HjbPde {
                    problem,
                    mode,
                    rollout: c.rollout.clone(),
                }
            }
            Self::HjbMdp(c) => {
                let problem = build_problem(
                    &c.grid,
                    &c.dynamics,
                    &c.cost,
                    SolveMode::Mdp,
                    c.control_resolution,
                    limits,
                )?;
                let defaults = MdpOptions::default();
                let options = MdpOptions {
                    dt: c.dt,
                    discount: c.discount,
                    tolerance: c.tolerance.unwrap_or(defaults.tolerance),
                    max_iterations: c.max_iterations.unwrap_or(defaults.max_iterations),
                    control_resolution: c.control_resolution,
                };
                options.validate().map_err(GatewayError::validation)?;
                Work::HjbMdp { problem, options }
            }
            Self::Sb(c) => {
                let source_spec = MarginalSpec::parse(&c.mu).map_err(GatewayError::validation)?;
                let target_spec = MarginalSpec::parse(&c.nu).map_err(GatewayError::validation)?;
                // Sized before any point is sampled.
                check_budget(
                    "coupling",
                    source_spec.len().saturating_mul(target_spec.len()),
                    limits,
                )?;
                let source = source_spec.realise(&c.mu).map_err(GatewayError::validation)?;
                let target = target_spec.realise(&c.nu).map_err(GatewayError::validation)?;
                if source.dim() != target.dim() {
                    return Err(GatewayError::Validation(format!(
                        "mu has dimension {}, nu has {}",
                        source.dim(),
                        target.dim()
                    )));
                }
                let sinkhorn = SinkhornConfig {
                    epsilon: c.eps,
                    max_iterations: c.iters,
                    tolerance: c.tol,
                    warm_start: None,
                };
                sinkhorn.validate().map_err(GatewayError::validation)?;
                Work::Sb {
                    source,
                    target,
                    metric: c.cost,
                    sinkhorn,
                    frame_times: limits.default_frame_times.clone(),
                }
            }
            Self::DiffusionFp(c) => {
                c.validate().map_err(GatewayError::validation)?;
                check_budget("grid", c.cells(), limits)?;
                check_steps("fokker-planck run", c.steps, limits.max_steps)?;
                Work::DiffusionFp(c.clone())
            }
            Self::DiffusionSde(c) => {
                c.validate().map_err(GatewayError::validation)?;
                check_budget("grid", c.cells(), limits)?;
                check_budget("particle set", c.particles, limits)?;
                check_steps("particle run", c.steps, limits.max_steps)?;
                Work::DiffusionSde(c.clone())
            }
        };
        Ok(PreparedJob {
            kind: self.kind(),
            work,
        })
    }
}

#[derive(Debug)]
enum PdeMode {
    Stationary(StationaryOptions),
    TimeDependent(TimeDependentOptions),
}

enum Work {
    HjbPde {
        problem: ControlProblem,
        mode: PdeMode,
        rollout: Option<RolloutRequest>,
    },
    HjbMdp {
        problem: ControlProblem,
        options: MdpOptions,
    },
    Sb {
        source: Marginal,
        target: Marginal,
        metric: CostMetric,
        sinkhorn: SinkhornConfig,
        frame_times: Vec<f64>,
    },
    DiffusionFp(FokkerPlanckConfig),
    DiffusionSde(SdeConfig),
}

/// A validated config ready to run on a solver thread.
pub struct PreparedJob {
    kind: JobKind,
    work: Work,
}

impl std::fmt::Debug for PreparedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedJob")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// What a successful solve hands back to the store.
#[derive(Debug)]
pub struct JobOutcome {
    /// JSON metrics for the job record.
    pub metrics: Value,
    /// Produced artifacts.
    pub artifacts: Vec<Artifact>,
    /// Data kept for follow-up requests.
    pub payload: Option<JobPayload>,
}

/// Simulate a solved grid policy, mapping NaN/Inf to a numerical error.
/// `request` must already have passed [`RolloutRequest::check`].
pub(crate) fn simulate_rollout(
    grid: &Grid,
    dynamics: &dyn Dynamics,
    cost: &dyn CostModel,
    policy: &[Vec<f64>],
    request: &RolloutRequest,
) -> Result<RolloutTrace, GatewayError> {
    let policy = GridPolicy::new(grid.clone(), policy.to_vec())?;
    Rollout::new(
        dynamics,
        &policy,
        cost,
        request.start.clone(),
        request.dt,
        request.steps,
    )?
    .run()
    .map_err(|e| match e {
        HjbError::NonFinite { .. } => GatewayError::Numerical(e.to_string()),
        other => other.into(),
    })
}

fn hjb_artifacts(grid: &Grid, solution: &HjbSolution) -> Result<Vec<Artifact>, GatewayError> {
    Ok(vec![
        encode_value_csv(&solution.value),
        encode_policy_csv(grid, &solution.policy)?,
    ])
}

impl PreparedJob {
    /// Kind of job this work belongs to.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Run the solve. Polls `cancel` at every solver iteration.
    pub fn run(self, cancel: &CancelToken) -> Result<JobOutcome, GatewayError> {
        match self.work {
            Work::HjbPde {
                problem,
                mode,
                rollout,
            } => {
                let ControlProblem {
                    grid,
                    dynamics,
                    cost,
                } = problem;
                let (solution, mode_name) = match &mode {
                    PdeMode::Stationary(o) => (
                        solve_stationary(&grid, dynamics.as_ref(), cost.as_ref(), o, cancel)?,
                        "stationary",
                    ),
                    PdeMode::TimeDependent(o) => (
                        solve_time_dependent(&grid, dynamics.as_ref(), cost.as_ref(), o, cancel)?,
                        "time_dependent",
                    ),
                };
                let mut metrics = json!({
                    "mode": mode_name,
                    "iterations": solution.iterations,
                    "residual": solution.residual,
                    "converged": solution.converged,
                });
                let mut artifacts = hjb_artifacts(&grid, &solution)?;
                if let Some(request) = rollout {
                    let trace = simulate_rollout(
                        &grid,
                        dynamics.as_ref(),
                        cost.as_ref(),
                        &solution.policy,
                        &request,
                    )?;
                    metrics["rolloutTotalCost"] = json!(trace.total_cost);
                    artifacts.push(encode_rollout(&trace)?);
                }
                Ok(JobOutcome {
                    metrics,
                    artifacts,
                    payload: Some(JobPayload::Hjb(HjbPayload {
                        grid,
                        dynamics,
                        cost,
                        policy: solution.policy,
                    })),
                })
            }
            Work::HjbMdp { problem, options } => {
                let ControlProblem {
                    grid,
                    dynamics,
                    cost,
                } = problem;
                let mdp = LatticeMdp::new(&grid, dynamics.as_ref(), cost.as_ref(), &options)?;
                let solution = mdp.solve(&options, cancel)?;
                let metrics = json!({
                    "iterations": solution.iterations,
                    "residual": solution.residual,
                    "converged": solution.converged,
                    "ties": solution.ties,
                    "actions": mdp.controls().len(),
                });
                let artifacts = vec![
                    encode_value_csv(&solution.value),
                    encode_policy_csv(&grid, &solution.policy)?,
                ];
                Ok(JobOutcome {
                    metrics,
                    artifacts,
                    payload: Some(JobPayload::Hjb(HjbPayload {
                        grid,
                        dynamics,
                        cost,
                        policy: solution.policy,
                    })),
                })
            }
            Work::Sb {
                source,
                target,
                metric,
                sinkhorn,
                frame_times,
            } => {
                let cost = cost_matrix(&source, &target, metric)?;
                let result = log_sinkhorn(
                    source.weights(),
                    target.weights(),
                    &cost,
                    source.len(),
                    target.len(),
                    &sinkhorn,
                    cancel,
                )?;
                let frames = interpolate(
                    &result.coupling,
                    source.points(),
                    target.points(),
                    &frame_times,
                )?;
                let metrics = json!({
                    "iterations": result.iterations,
                    "marginalError": result.marginal_error,
                    "converged": result.converged,
                    "transportCost": result.diagnostics.transport_cost,
                    "entropy": result.diagnostics.entropy,
                });
                let mut diagnostics = Map::new();
                diagnostics.insert("epsilon".into(), json!(sinkhorn.epsilon));
                diagnostics.insert("cost".into(), json!(metric.to_string()));
                diagnostics.insert("diagnostics".into(), json!(result.diagnostics));
                diagnostics.insert("history".into(), json!(result.history));
                let artifacts = vec![
                    encode_coupling(&result.coupling, result.rows, result.cols)?,
                    encode_metrics("diagnostics.json", diagnostics),
                    encode_frames(&frames)?,
                ];
                Ok(JobOutcome {
                    metrics,
                    artifacts,
                    payload: Some(JobPayload::Sb(SbPayload {
                        coupling: result.coupling,
                        source: source.points().to_vec(),
                        target: target.points().to_vec(),
                    })),
                })
            }
            Work::DiffusionFp(config) => {
                let result = run_fokker_planck(&config, cancel)?;
                let metrics = json!({
                    "massDrift": result.mass_drift,
                    "initialMass": result.initial_mass,
                    "massHistory": result.mass_history,
                    "substeps": result.substeps,
                    "frames": result.densities.len(),
                    "seed": result.seed,
                });
                let artifacts = result
                    .densities
                    .iter()
                    .enumerate()
                    .map(|(i, d)| encode_density_frame(i, d))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(JobOutcome {
                    metrics,
                    artifacts,
                    payload: None,
                })
            }
            Work::DiffusionSde(config) => {
                let result = run_euler_maruyama(&config, cancel)?;
                let metrics = json!({
                    "particles": config.particles,
                    "steps": config.steps,
                    "snapshots": result.snapshots.len(),
                    "seed": config.seed,
                });
                let mut artifacts = Vec::with_capacity(2 * result.snapshots.len());
                for (i, snapshot) in result.snapshots.iter().enumerate() {
                    artifacts.push(encode_particles(i, snapshot)?);
                }
                for (i, density) in result.densities.iter().enumerate() {
                    artifacts.push(encode_density_frame(i, density)?);
                }
                Ok(JobOutcome {
                    metrics,
                    artifacts,
                    payload: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pde_json() -> Value {
        json!({
            "grid": { "shape": [9, 9], "spacing": [0.5, 0.5], "origin": [-2.0, -2.0] },
            "dynamics": { "type": "single_integrator", "options": { "controlLimit": 2.0 } },
            "cost": { "type": "quadratic" },
            "tolerance": 1e-3
        })
    }

    #[test]
    fn parses_and_prepares_pde_config() {
        let config = SolverConfig::from_json(JobKind::HjbPde, &pde_json()).unwrap();
        assert_eq!(config.kind(), JobKind::HjbPde);
        let job = config.prepare(&GatewayConfig::default()).unwrap();
        assert_eq!(job.kind(), JobKind::HjbPde);
    }

    #[test]
    fn tagged_form_round_trips() {
        let config = SolverConfig::from_json(JobKind::HjbPde, &pde_json()).unwrap();
        let tagged = serde_json::to_value(&config).unwrap();
        assert_eq!(tagged["kind"], "hjb.pde");
        let back: SolverConfig = serde_json::from_value(tagged).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn dimension_mismatch_fails_validation() {
        let mut raw = pde_json();
        raw["dynamics"]["options"]["dimension"] = json!(3);
        let config = SolverConfig::from_json(JobKind::HjbPde, &raw).unwrap();
        assert!(matches!(
            config.prepare(&GatewayConfig::default()),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn unknown_fields_and_bad_types_are_rejected() {
        let mut raw = pde_json();
        raw["horizont"] = json!(1.0);
        assert!(SolverConfig::from_json(JobKind::HjbPde, &raw).is_err());
        assert!(SolverConfig::from_json(JobKind::Sb, &json!({"mu": 1})).is_err());
    }

    #[test]
    fn grid_budget_is_enforced() {
        let config = SolverConfig::from_json(JobKind::HjbPde, &pde_json()).unwrap();
        let tight = GatewayConfig {
            max_grid_cells: 10,
            ..GatewayConfig::default()
        };
        assert!(config.prepare(&tight).is_err());
    }

    #[test]
    fn sb_defaults_follow_the_wire_contract() {
        let config = SolverConfig::from_json(
            JobKind::Sb,
            &json!({"mu": "uniform:0:1:4", "nu": "uniform:2:3:4", "eps": 0.1}),
        )
        .unwrap();
        let SolverConfig::Sb(sb) = &config else {
            panic!("expected sb config");
        };
        assert_eq!(sb.iters, 500);
        assert_eq!(sb.tol, 1e-3);
        assert_eq!(sb.cost, CostMetric::L2);
        assert!(config.prepare(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn bad_marginal_and_epsilon_fail_before_any_job() {
        let limits = GatewayConfig::default();
        for raw in [
            json!({"mu": "laplace:0:1", "nu": "uniform:0:1", "eps": 0.1}),
            json!({"mu": "uniform:0:1", "nu": "uniform:0:1", "eps": 0.0}),
            json!({"mu": "uniform:0:1", "nu": "gaussian:0,0:1", "eps": 0.1}),
        ] {
            let config = SolverConfig::from_json(JobKind::Sb, &raw).unwrap();
            assert!(config.prepare(&limits).is_err(), "{raw}");
        }
    }

    #[test]
    fn rollout_start_must_match_state() {
        let mut raw = pde_json();
        raw["rollout"] = json!({"start": [1.0]});
        let config = SolverConfig::from_json(JobKind::HjbPde, &raw).unwrap();
        assert!(config.prepare(&GatewayConfig::default()).is_err());
    }

    fn rejection(kind: JobKind, raw: &Value) -> String {
        let config = SolverConfig::from_json(kind, raw).unwrap();
        match config.prepare(&GatewayConfig::default()) {
            Err(GatewayError::Validation(reason)) => reason,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn wide_control_box_is_rejected_before_enumeration() {
        let mut raw = pde_json();
        raw["dynamics"]["options"]["controlLimit"] = json!(1e13);
        let reason = rejection(JobKind::HjbPde, &raw);
        assert!(reason.contains("control lattice"), "{reason}");
    }

    #[test]
    fn many_control_axes_are_rejected_before_enumeration() {
        let raw = json!({
            "grid": { "shape": vec![1; 12], "spacing": vec![1.0; 12], "origin": vec![0.0; 12] },
            "dynamics": { "type": "single_integrator", "options": { "dimension": 12 } },
            "cost": { "type": "quadratic" }
        });
        let reason = rejection(JobKind::HjbPde, &raw);
        assert!(reason.contains("control lattice"), "{reason}");
        let reason = rejection(JobKind::HjbMdp, &raw);
        assert!(reason.contains("control lattice"), "{reason}");
    }

    #[test]
    fn state_control_table_shares_the_cell_budget() {
        // 101 x 101 cells, 9 x 9 controls.
        let raw = json!({
            "grid": { "shape": [101, 101], "spacing": [0.04, 0.04], "origin": [-2.0, -2.0] },
            "dynamics": { "type": "single_integrator", "options": { "controlLimit": 2.0 } },
            "cost": { "type": "quadratic" },
            "controlResolution": 0.5
        });
        let config = SolverConfig::from_json(JobKind::HjbMdp, &raw).unwrap();
        let tight = GatewayConfig {
            max_grid_cells: 101 * 101 * 80,
            ..GatewayConfig::default()
        };
        let Err(GatewayError::Validation(reason)) = config.prepare(&tight) else {
            panic!("table over budget was accepted");
        };
        assert!(reason.contains("state-control table"), "{reason}");
        let roomy = GatewayConfig {
            max_grid_cells: 101 * 101 * 81,
            ..GatewayConfig::default()
        };
        assert!(config.prepare(&roomy).is_ok());
    }

    #[test]
    fn huge_marginals_are_rejected_before_sampling() {
        let reason = rejection(
            JobKind::Sb,
            &json!({"mu": "uniform:0:1:100000000000000", "nu": "uniform:0:1:4", "eps": 0.1}),
        );
        assert!(reason.contains("exceeds the limit"), "{reason}");
        // Each side is within the point cap; the coupling is not.
        let reason = rejection(
            JobKind::Sb,
            &json!({"mu": "uniform:0:1:100000", "nu": "gaussian:0:1:100000", "eps": 0.1}),
        );
        assert!(reason.contains("coupling"), "{reason}");
    }

    #[test]
    fn step_counts_are_bounded() {
        let huge = 1_u64 << 50;
        let reason = rejection(
            JobKind::DiffusionFp,
            &json!({"grid": [16, 16], "steps": huge, "dt": 0.01}),
        );
        assert!(reason.contains("steps"), "{reason}");
        let reason = rejection(
            JobKind::DiffusionSde,
            &json!({"grid": [16, 16], "particles": 8, "steps": huge, "dt": 0.01}),
        );
        assert!(reason.contains("steps"), "{reason}");
        let mut raw = pde_json();
        raw["rollout"] = json!({"start": [1.0, 1.0], "steps": huge});
        let reason = rejection(JobKind::HjbPde, &raw);
        assert!(reason.contains("rollout"), "{reason}");

        let at_limit = GatewayConfig::default().max_steps;
        let config = SolverConfig::from_json(
            JobKind::DiffusionFp,
            &json!({"grid": [16, 16], "steps": at_limit, "dt": 0.01}),
        )
        .unwrap();
        assert!(config.prepare(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn small_fp_run_produces_frames() {
        let config = SolverConfig::from_json(
            JobKind::DiffusionFp,
            &json!({"grid": [16, 16], "steps": 5, "dt": 0.01}),
        )
        .unwrap();
        let outcome = config
            .prepare(&GatewayConfig::default())
            .unwrap()
            .run(&CancelToken::new())
            .unwrap();
        assert_eq!(outcome.artifacts[0].name(), "density_000.bin");
        assert!(outcome.metrics["massDrift"].as_f64().unwrap() < 1e-3);
        assert!(outcome.payload.is_none());
    }

    #[test]
    fn cancelled_token_stops_the_solve() {
        let config = SolverConfig::from_json(JobKind::HjbPde, &pde_json()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = config
            .prepare(&GatewayConfig::default())
            .unwrap()
            .run(&token)
            .unwrap_err();
        assert_eq!(err.to_string(), "cancelled");
    }
}
