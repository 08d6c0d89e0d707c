//! Resolver surface: queries, mutations and subscriptions.
//!
//! Every resolver takes the caller's [`GatewayContext`] and checks its
//! role first. Mutations run inside a [`Tracer`] span, validate the
//! submitted config, create a `queued` job and hand the solve to the
//! [`SolverPool`]; they never wait for the solve itself.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pathwise_artifact::{encode_frames, encode_rollout, Artifact};
use pathwise_sb::{interpolate, CostMetric};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::auth::{assert_role, GatewayContext, Role};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError, StoreError};
use crate::events::JobEvents;
use crate::job::{Job, JobFamily, JobKind, JobStatus};
use crate::pool::SolverPool;
use crate::solver::{simulate_rollout, PreparedJob, RolloutRequest, SbConfig, SolverConfig};
use crate::store::{JobPayload, JobStore};
use crate::trace::{attrs, SpanExporter, Tracer};

/// Everything a gateway instance owns.
///
/// Nothing here is global: two gateways in one process have separate
/// stores, tracers and worker pools.
#[derive(Debug)]
pub struct GatewayState {
    store: Arc<JobStore>,
    tracer: Tracer,
    pool: SolverPool,
    config: GatewayConfig,
}

impl GatewayState {
    /// The job registry.
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// The span tracer.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The solver threads.
    pub fn pool(&self) -> &SolverPool {
        &self.pool
    }

    /// Limits and defaults in force.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Arguments of the `sbRun` mutation.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SbRunArgs {
    /// Source marginal spec.
    pub mu: String,
    /// Target marginal spec.
    pub nu: String,
    /// Entropic regularisation.
    pub eps: f64,
    /// Iteration cap, default 500.
    pub iters: Option<usize>,
    /// Tolerance, default `1e-3`.
    pub tol: Option<f64>,
    /// Ground cost name, default `l2`.
    pub cost: Option<String>,
}

impl SbRunArgs {
    /// Arguments with every optional field at its default.
    pub fn new(mu: impl Into<String>, nu: impl Into<String>, eps: f64) -> Self {
        Self {
            mu: mu.into(),
            nu: nu.into(),
            eps,
            ..Self::default()
        }
    }

    fn into_config(self) -> Result<SbConfig, GatewayError> {
        let cost = match self.cost.as_deref() {
            Some(name) => name.parse::<CostMetric>().map_err(GatewayError::validation)?,
            None => CostMetric::default(),
        };
        Ok(SbConfig {
            mu: self.mu,
            nu: self.nu,
            eps: self.eps,
            iters: self.iters.unwrap_or(500),
            tol: self.tol.unwrap_or(1e-3),
            cost,
        })
    }
}

/// Handle to a running gateway. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Validate `config`, start the solver threads and wire spans to
    /// `exporter`.
    pub fn new(
        config: GatewayConfig,
        exporter: Arc<dyn SpanExporter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = SolverPool::new(config.resolved_worker_count(), config.queue_capacity)?;
        let state = GatewayState {
            store: Arc::new(JobStore::new(config.event_buffer)),
            tracer: Tracer::new(exporter),
            pool,
            config,
        };
        Ok(Self {
            state: Arc::new(state),
        })
    }

    /// Shared state behind this handle.
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    fn lookup(
        &self,
        ctx: &GatewayContext,
        id: &str,
        family: JobFamily,
    ) -> Result<Option<Job>, GatewayError> {
        assert_role(ctx, Role::Viewer)?;
        Ok(self
            .state
            .store
            .get(id)
            .filter(|job| job.kind().family() == family)
            .map(|job| if ctx.redacted { job.redact() } else { job }))
    }

    /// `hjbJob(id)`.
    pub async fn hjb_job(
        &self,
        ctx: &GatewayContext,
        id: &str,
    ) -> Result<Option<Job>, GatewayError> {
        self.lookup(ctx, id, JobFamily::Hjb)
    }

    /// `sbJob(id)`.
    pub async fn sb_job(
        &self,
        ctx: &GatewayContext,
        id: &str,
    ) -> Result<Option<Job>, GatewayError> {
        self.lookup(ctx, id, JobFamily::Sb)
    }

    /// `diffJob(id)`.
    pub async fn diff_job(
        &self,
        ctx: &GatewayContext,
        id: &str,
    ) -> Result<Option<Job>, GatewayError> {
        self.lookup(ctx, id, JobFamily::Diffusion)
    }

    /// Create a queued job for `prepared` and hand it to the pool.
    ///
    /// A queue that is full or closed fails the job at once; the failed
    /// job is still returned so the caller has an id to inspect.
    fn enqueue(&self, config: Value, prepared: PreparedJob) -> Result<Job, GatewayError> {
        let kind = prepared.kind();
        let job = self.state.store.create(kind, config);
        let id = job.id().to_string();
        let store = Arc::clone(&self.state.store);
        let tracer = self.state.tracer.clone();
        let task_id = id.clone();
        let submitted = self.state.pool.submit(Box::new(move || {
            run_job(&store, &tracer, &task_id, prepared);
        }));
        match submitted {
            Ok(()) => {
                tracing::info!(job.id = %id, kind = %kind, "job queued");
                Ok(job)
            }
            Err(e) => {
                tracing::warn!(
                    job.id = %id, kind = %kind, error = %e,
                    "job rejected by solver pool"
                );
                Ok(self.state.store.fail(&id, e.to_string())?)
            }
        }
    }

    async fn submit<F>(
        &self,
        ctx: &GatewayContext,
        op: &'static str,
        kind: JobKind,
        parse: F,
    ) -> Result<Job, GatewayError>
    where
        F: FnOnce() -> Result<(SolverConfig, Value), GatewayError>,
    {
        let span_attrs = attrs([("kind", kind.to_string())]);
        self.state
            .tracer
            .in_span(op, span_attrs, async {
                assert_role(ctx, Role::Operator)?;
                let (config, raw) = parse()?;
                let prepared = config.prepare(&self.state.config)?;
                self.enqueue(raw, prepared)
            })
            .await
    }

    async fn submit_json(
        &self,
        ctx: &GatewayContext,
        op: &'static str,
        kind: JobKind,
        config: Value,
    ) -> Result<Job, GatewayError> {
        self.submit(ctx, op, kind, || {
            let parsed = SolverConfig::from_json(kind, &config)?;
            Ok((parsed, config))
        })
        .await
    }

    /// `hjbSolvePDE(config)`.
    pub async fn hjb_solve_pde(
        &self,
        ctx: &GatewayContext,
        config: Value,
    ) -> Result<Job, GatewayError> {
        self.submit_json(ctx, "hjbSolvePDE", JobKind::HjbPde, config).await
    }

    /// `hjbSolveMDP(config)`.
    pub async fn hjb_solve_mdp(
        &self,
        ctx: &GatewayContext,
        config: Value,
    ) -> Result<Job, GatewayError> {
        self.submit_json(ctx, "hjbSolveMDP", JobKind::HjbMdp, config).await
    }

    /// `sbRun(mu, nu, eps, iters, tol, cost)`.
    pub async fn sb_run(&self, ctx: &GatewayContext, args: SbRunArgs) -> Result<Job, GatewayError> {
        self.submit(ctx, "sbRun", JobKind::Sb, || {
            let config = args.into_config()?;
            let raw = serde_json::to_value(&config).map_err(GatewayError::validation)?;
            Ok((SolverConfig::Sb(config), raw))
        })
        .await
    }

    /// `diffusionRunFP(config)`.
    pub async fn diffusion_run_fp(
        &self,
        ctx: &GatewayContext,
        config: Value,
    ) -> Result<Job, GatewayError> {
        self.submit_json(ctx, "diffusionRunFP", JobKind::DiffusionFp, config)
            .await
    }

    /// `diffusionRunSDE(config)`.
    pub async fn diffusion_run_sde(
        &self,
        ctx: &GatewayContext,
        config: Value,
    ) -> Result<Job, GatewayError> {
        self.submit_json(ctx, "diffusionRunSDE", JobKind::DiffusionSde, config)
            .await
    }

    /// A succeeded job of `family` together with its attached payload.
    fn finished(&self, id: &str, family: JobFamily) -> Result<Arc<JobPayload>, GatewayError> {
        let job = self
            .state
            .store
            .get(id)
            .filter(|job| job.kind().family() == family)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if job.status() != JobStatus::Succeeded {
            return Err(GatewayError::NotReady {
                id: id.to_string(),
                reason: format!("job is {}", job.status()),
            });
        }
        self.state
            .store
            .payload(id)
            .ok_or_else(|| GatewayError::NotReady {
                id: id.to_string(),
                reason: "no solver output attached".into(),
            })
    }

    /// `hjbRollout(jobId, start, steps, dt)`.
    ///
    /// Simulates the policy of a succeeded HJB job on a solver thread.
    /// A NaN or infinity fails this call with
    /// [`GatewayError::Numerical`]; the referenced job is untouched.
    pub async fn hjb_rollout(
        &self,
        ctx: &GatewayContext,
        job_id: &str,
        start: Vec<f64>,
        steps: Option<usize>,
        dt: Option<f64>,
    ) -> Result<Artifact, GatewayError> {
        let span_attrs = attrs([("job.id", job_id.to_string())]);
        self.state
            .tracer
            .in_span("hjbRollout", span_attrs, async {
                assert_role(ctx, Role::Operator)?;
                let payload = self.finished(job_id, JobFamily::Hjb)?;
                let JobPayload::Hjb(solved) = payload.as_ref() else {
                    return Err(no_policy(job_id));
                };
                let mut request = RolloutRequest::new(start);
                if let Some(steps) = steps {
                    request.steps = steps;
                }
                if let Some(dt) = dt {
                    request.dt = dt;
                }
                // Rejected here, before the request reaches a solver thread.
                request.check(solved.dynamics.state_dim(), self.state.config.max_steps)?;
                let (tx, rx) = oneshot::channel::<Result<Artifact, GatewayError>>();
                let id = job_id.to_string();
                self.state.pool.submit(Box::new(move || {
                    let result = match payload.as_ref() {
                        JobPayload::Hjb(p) => simulate_rollout(
                            &p.grid,
                            p.dynamics.as_ref(),
                            p.cost.as_ref(),
                            &p.policy,
                            &request,
                        )
                        .and_then(|trace| Ok(encode_rollout(&trace)?)),
                        JobPayload::Sb(_) => Err(no_policy(&id)),
                    };
                    // The caller may have gone away.
                    let _ = tx.send(result);
                }))?;
                // A dropped sender means the task panicked.
                rx.await.map_err(|_| GatewayError::Panicked)?
            })
            .await
    }

    /// `sbFrames(jobId, t)`.
    ///
    /// An empty `t` uses the configured default frame times. Returns an
    /// empty list for redacted callers.
    pub async fn sb_frames(
        &self,
        ctx: &GatewayContext,
        job_id: &str,
        t: Vec<f64>,
    ) -> Result<Vec<Artifact>, GatewayError> {
        let span_attrs = attrs([("job.id", job_id.to_string()), ("frames", t.len().to_string())]);
        self.state
            .tracer
            .in_span("sbFrames", span_attrs, async {
                assert_role(ctx, Role::Operator)?;
                let payload = self.finished(job_id, JobFamily::Sb)?;
                let JobPayload::Sb(p) = payload.as_ref() else {
                    return Err(GatewayError::NotReady {
                        id: job_id.to_string(),
                        reason: "job holds no coupling".into(),
                    });
                };
                let times = if t.is_empty() {
                    self.state.config.default_frame_times.clone()
                } else {
                    t
                };
                let frames = interpolate(&p.coupling, &p.source, &p.target, &times)?;
                let artifact = encode_frames(&frames)?;
                Ok(if ctx.redacted { Vec::new() } else { vec![artifact] })
            })
            .await
    }

    fn events(
        &self,
        ctx: &GatewayContext,
        family: JobFamily,
        job_id: Option<&str>,
    ) -> Result<JobEvents, GatewayError> {
        assert_role(ctx, Role::Viewer)?;
        Ok(JobEvents::new(
            self.state.store.subscribe(),
            family,
            job_id.map(str::to_string),
            ctx.redacted,
        ))
    }

    /// `hjbEvents(jobId)`.
    pub fn hjb_events(
        &self,
        ctx: &GatewayContext,
        job_id: Option<&str>,
    ) -> Result<JobEvents, GatewayError> {
        self.events(ctx, JobFamily::Hjb, job_id)
    }

    /// `sbEvents(jobId)`.
    pub fn sb_events(
        &self,
        ctx: &GatewayContext,
        job_id: Option<&str>,
    ) -> Result<JobEvents, GatewayError> {
        self.events(ctx, JobFamily::Sb, job_id)
    }

    /// `diffEvents(jobId)`.
    pub fn diff_events(
        &self,
        ctx: &GatewayContext,
        job_id: Option<&str>,
    ) -> Result<JobEvents, GatewayError> {
        self.events(ctx, JobFamily::Diffusion, job_id)
    }

    /// Wait until job `id` reaches a terminal status.
    pub async fn wait_for(&self, id: &str) -> Result<Job, GatewayError> {
        Ok(self.state.store.wait_terminal(id).await?)
    }

    /// Cancel every unfinished job, close the queue and join the solver
    /// threads. Blocks until running solves notice their cancel token.
    ///
    /// Returns the number of jobs cancelled.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.state.store.cancel_all();
        let joined = self.state.pool.shutdown();
        tracing::info!(cancelled, joined, "gateway shut down");
        cancelled
    }
}

/// Drive one job from `queued` to a terminal status on a solver thread.
fn no_policy(id: &str) -> GatewayError {
    GatewayError::NotReady {
        id: id.to_string(),
        reason: "job holds no policy".into(),
    }
}

fn run_job(store: &JobStore, tracer: &Tracer, id: &str, prepared: PreparedJob) {
    let Some(cancel) = store.cancel_token(id) else {
        tracing::warn!(job.id = %id, "queued job vanished");
        return;
    };
    let settled = if cancel.is_cancelled() {
        store.fail(id, "cancelled")
    } else {
        match store.mark_running(id) {
            Ok(_) => {
                let kind = prepared.kind();
                let span_attrs = attrs([("job.id", id.to_string()), ("kind", kind.to_string())]);
                let result = tracer.record("job.run", span_attrs, || {
                    panic::catch_unwind(AssertUnwindSafe(|| prepared.run(&cancel)))
                        .unwrap_or(Err(GatewayError::Panicked))
                });
                match result {
                    Ok(outcome) => {
                        let attached = match outcome.payload {
                            Some(payload) => store.attach(id, payload),
                            None => Ok(()),
                        };
                        attached
                            .and_then(|()| store.complete(id, outcome.metrics, outcome.artifacts))
                    }
                    Err(e) => store.fail(id, e.to_string()),
                }
            }
            Err(e) => Err(e),
        }
    };
    match settled {
        Ok(job) => tracing::info!(job.id = %id, status = %job.status(), "job finished"),
        Err(e) => tracing::warn!(job.id = %id, error = %e, "job could not be settled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NoopExporter;
    use serde_json::json;

    fn gateway() -> Gateway {
        let config = GatewayConfig {
            worker_count: Some(1),
            ..GatewayConfig::default()
        };
        Gateway::new(config, Arc::new(NoopExporter)).unwrap()
    }

    #[test]
    fn sb_args_fill_defaults() {
        let config = SbRunArgs::new("uniform:0:1", "uniform:1:2", 0.1)
            .into_config()
            .unwrap();
        assert_eq!(config.iters, 500);
        assert_eq!(config.tol, 1e-3);
        assert_eq!(config.cost, CostMetric::L2);
    }

    #[test]
    fn unknown_cost_name_is_a_validation_error() {
        let mut args = SbRunArgs::new("uniform:0:1", "uniform:1:2", 0.1);
        args.cost = Some("hamming".into());
        assert!(matches!(args.into_config(), Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn queries_hide_other_families() {
        let gw = gateway();
        let op = GatewayContext::new(Role::Operator);
        let job = gw
            .sb_run(&op, SbRunArgs::new("uniform:0:1:4", "uniform:1:2:4", 0.1))
            .await
            .unwrap();
        assert!(gw.hjb_job(&op, job.id()).await.unwrap().is_none());
        assert!(gw.sb_job(&op, job.id()).await.unwrap().is_some());
        assert!(gw.sb_job(&op, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_config_creates_no_job() {
        let gw = gateway();
        let op = GatewayContext::new(Role::Operator);
        let err = gw
            .hjb_solve_pde(&op, json!({"grid": {"shape": [0], "spacing": [1.0], "origin": [0.0]}}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)), "{err}");
        assert!(gw.state().store().list().is_empty());
    }

    #[tokio::test]
    async fn oversized_requests_create_no_job() {
        let gw = gateway();
        let op = GatewayContext::new(Role::Operator);
        let wide_controls = json!({
            "grid": { "shape": [9, 9], "spacing": [0.5, 0.5], "origin": [-2.0, -2.0] },
            "dynamics": { "type": "single_integrator", "options": { "controlLimit": 1e13 } },
            "cost": { "type": "quadratic" }
        });
        let results = [
            gw.hjb_solve_pde(&op, wide_controls.clone()).await,
            gw.hjb_solve_mdp(&op, wide_controls).await,
            gw.sb_run(
                &op,
                SbRunArgs::new("uniform:0:1:100000000000000", "uniform:0:1:4", 0.1),
            )
            .await,
            gw.diffusion_run_fp(&op, json!({"grid": [16, 16], "steps": 1_u64 << 50})).await,
            gw.diffusion_run_sde(&op, json!({"particles": 8, "steps": 1_u64 << 50})).await,
        ];
        for result in results {
            let err = result.unwrap_err();
            assert!(matches!(err, GatewayError::Validation(_)), "{err}");
        }
        assert!(gw.state().store().list().is_empty());
    }

    #[tokio::test]
    async fn missing_role_is_rejected_everywhere() {
        let gw = gateway();
        let anon = GatewayContext::default();
        assert!(matches!(
            gw.diff_job(&anon, "x").await,
            Err(GatewayError::Auth(_))
        ));
        assert!(matches!(
            gw.diff_events(&anon, None),
            Err(GatewayError::Auth(_))
        ));
    }
}
