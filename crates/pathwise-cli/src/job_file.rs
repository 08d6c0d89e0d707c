//! Job files and artifact output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pathwise_artifact::ArtifactData;
use pathwise_gateway::{Gateway, GatewayContext, Job, JobKind, SbRunArgs};
use serde::Deserialize;
use serde_json::Value;

/// `{"kind": "...", "config": {...}}`, the same shape as a tagged
/// `SolverConfig`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct JobFile {
    pub(crate) kind: JobKind,
    #[serde(default)]
    pub(crate) config: Value,
}

impl JobFile {
    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    /// Hand the job to the matching mutation.
    pub(crate) async fn submit(self, gw: &Gateway, ctx: &GatewayContext) -> Result<Job> {
        let job = match self.kind {
            JobKind::HjbPde => gw.hjb_solve_pde(ctx, self.config).await?,
            JobKind::HjbMdp => gw.hjb_solve_mdp(ctx, self.config).await?,
            JobKind::Sb => {
                let args: SbRunArgs =
                    serde_json::from_value(self.config).context("sb job arguments")?;
                gw.sb_run(ctx, args).await?
            }
            JobKind::DiffusionFp => gw.diffusion_run_fp(ctx, self.config).await?,
            JobKind::DiffusionSde => gw.diffusion_run_sde(ctx, self.config).await?,
        };
        Ok(job)
    }
}

/// Write each artifact of `job` under `dir`. Returns how many.
pub(crate) fn write_artifacts(dir: &Path, job: &Job) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for artifact in job.artifacts() {
        let path = dir.join(artifact.name());
        let bytes = match artifact.data() {
            ArtifactData::Bytes(b) => b.clone(),
            ArtifactData::Text(t) => t.clone().into_bytes(),
            ArtifactData::Map(m) => serde_json::to_vec_pretty(m)?,
        };
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(job.artifacts().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise_gateway::{GatewayConfig, JobStatus, NoopExporter, Role};
    use std::sync::Arc;

    #[test]
    fn kinds_use_wire_names() {
        let file =
            JobFile::parse(r#"{"kind": "diffusion.sde", "config": {"particles": 10}}"#).unwrap();
        assert_eq!(file.kind, JobKind::DiffusionSde);
        assert!(JobFile::parse(r#"{"kind": "hjb"}"#).is_err());
        assert!(JobFile::parse(r#"{"kind": "sb", "extra": 1}"#).is_err());
    }

    #[tokio::test]
    async fn sb_file_runs_and_writes_artifacts() {
        let file = JobFile::parse(
            r#"{"kind": "sb", "config": {
                "mu": "uniform:0:1:6", "nu": "uniform:2:3:6", "eps": 0.1, "cost": "l1"
            }}"#,
        )
        .unwrap();
        let gw = Gateway::new(
            GatewayConfig {
                worker_count: Some(1),
                ..GatewayConfig::default()
            },
            Arc::new(NoopExporter),
        )
        .unwrap();
        let ctx = GatewayContext::new(Role::Operator);
        let job = file.submit(&gw, &ctx).await.unwrap();
        let done = gw.wait_for(job.id()).await.unwrap();
        assert_eq!(done.status(), JobStatus::Succeeded);

        let dir = tempfile::tempdir().unwrap();
        let n = write_artifacts(dir.path(), &done).unwrap();
        assert_eq!(n, 3);
        assert!(dir.path().join("pi.bin").exists());
        let diagnostics = fs::read_to_string(dir.path().join("diagnostics.json")).unwrap();
        assert!(diagnostics.contains("history"));
    }
}
