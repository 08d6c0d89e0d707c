//! `pathwise` command-line runner.
//!
//! ```text
//! pathwise run job.json [--gateway gateway.toml] [--out DIR]
//!     -> Gateway::new -> mutation for job.kind -> wait_for -> Job JSON on stdout
//! pathwise schema
//!     -> GraphQL SDL on stdout
//! ```
//!
//! Logs go to stderr so stdout stays machine-readable.

mod job_file;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pathwise_gateway::{
    Gateway, GatewayConfig, GatewayContext, JobStatus, NoopExporter, Role, SCHEMA_SDL,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::job_file::{write_artifacts, JobFile};

#[derive(Parser)]
#[command(name = "pathwise")]
#[command(about = "Run HJB, diffusion and Schrödinger-bridge jobs from config files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one job and print the finished Job as JSON
    Run {
        /// Job file: {"kind": "hjb.pde", "config": {...}}
        job: PathBuf,
        /// Gateway settings (TOML)
        #[arg(long)]
        gateway: Option<PathBuf>,
        /// Write every artifact into this directory
        #[arg(long)]
        out: Option<PathBuf>,
        /// Caller role
        #[arg(long, default_value = "operator")]
        role: String,
    },
    /// Print the GraphQL schema
    Schema,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn run(
    job: PathBuf,
    gateway: Option<PathBuf>,
    out: Option<PathBuf>,
    role: &str,
) -> Result<()> {
    let role: Role = role.parse().map_err(anyhow::Error::msg)?;
    let config = match gateway {
        Some(path) => GatewayConfig::load(&path)?,
        None => GatewayConfig::default(),
    };
    let file = JobFile::load(&job)?;
    let gw = Gateway::new(config, Arc::new(NoopExporter)).context("starting gateway")?;

    let ctx = GatewayContext::new(role);
    let submitted = file.submit(&gw, &ctx).await?;
    tracing::info!(job.id = submitted.id(), kind = %submitted.kind(), "submitted");
    let done = gw.wait_for(submitted.id()).await?;
    gw.shutdown();

    if let Some(dir) = &out {
        let written = write_artifacts(dir, &done)?;
        tracing::info!(count = written, dir = %dir.display(), "artifacts written");
    }
    println!("{}", serde_json::to_string_pretty(&done.view())?);

    if done.status() == JobStatus::Failed {
        bail!(
            "job {} failed: {}",
            done.id(),
            done.error().unwrap_or("unknown error")
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Run {
            job,
            gateway,
            out,
            role,
        } => run(job, gateway, out, &role).await,
        Commands::Schema => {
            print!("{SCHEMA_SDL}");
            Ok(())
        }
    }
}
