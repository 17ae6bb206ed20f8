//! Deploy command: provision, bootstrap and converge a cluster.

use anyhow::{Context, Result};
use cephlab_core::{
    DeployConfig, DeployMode, DeployOptions, HostExecutor, ImageSource, InstanceOrchestrator,
    LxdBackend, ResourceModel, RunContext,
};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Arguments for [`deploy`], collected from the command line.
pub struct DeployArgs {
    pub mode: DeployMode,
    pub image: ImageSource,
    pub expected_osds: u32,
    pub patch_replication: bool,
    pub config: Option<PathBuf>,
    pub source: PathBuf,
    pub resume: Option<PathBuf>,
}

/// Runs one deployment. The model file lands in the current directory unless a
/// run is resumed, in which case the resumed file is updated in place.
pub async fn deploy(args: DeployArgs) -> Result<()> {
    let config =
        DeployConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let source = args
        .source
        .canonicalize()
        .with_context(|| format!("Source tree not found: {}", args.source.display()))?;

    let (ctx, restored) = match &args.resume {
        Some(model_file) => RunContext::resume(model_file, source)?,
        None => {
            let model_dir = std::env::current_dir().context("Failed to resolve current directory")?;
            (RunContext::new(source, &model_dir), ResourceModel::new())
        }
    };
    debug!(run_id = %ctx.run_id(), "Run context ready");

    // Direct-host runs never call the backend, so lxc need not be installed.
    let backend = match args.mode {
        DeployMode::DirectHost => Arc::new(LxdBackend::with_binary("lxc")),
        DeployMode::Instance(_) => Arc::new(LxdBackend::new()?),
    };

    println!(
        "{} Deploying on {} with {} (run {})",
        "→".bold().blue(),
        args.mode.to_string().green(),
        args.image.to_string().cyan(),
        ctx.run_id().yellow()
    );
    println!("  Model file: {}", ctx.model_file().display());

    let options = DeployOptions {
        mode: args.mode,
        image: args.image,
        expected_osds: args.expected_osds,
        patch_replication: args.patch_replication,
    };
    let mut orchestrator = InstanceOrchestrator::new(
        ctx,
        config,
        options,
        backend.clone(),
        backend,
        Arc::new(HostExecutor::new()),
    )
    .with_model(restored);

    let report = orchestrator.deploy().await?;

    println!("{} Cluster is up", "✓".green().bold());
    if let Some(instance) = &report.instance {
        println!("  Instance:   {}", instance.green());
    }
    println!("  Image:      {}", report.image);
    println!("  OSDs:       {}", report.osd_count.to_string().yellow());
    println!("  Model file: {}", report.model_file.display());
    println!(
        "  Clean up with: {}",
        format!("cephlab delete {}", report.model_file.display()).bold()
    );
    Ok(())
}
