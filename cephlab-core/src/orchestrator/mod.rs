//! Deployment pipeline.
//!
//! [`InstanceOrchestrator`] provisions the lab infrastructure, installs cephadm,
//! bootstraps a cluster and waits for it to converge. Stages run strictly in
//! order; the first failure aborts the run. Whatever was created up to that point
//! is recorded in the resource model, which is persisted after every
//! provisioning step and once more when the run ends, however it ends.

pub mod cluster;
pub mod image;

pub use image::{insecure_registry_host, ImageSource};

use crate::backend::{InstanceTransport, VirtualizationBackend};
use crate::config::DeployConfig;
use crate::context::RunContext;
use crate::error::{CephlabError, Result};
use crate::exec::{argv, ClusterShell, InstanceExecutor, RemoteExecutor};
use crate::paths;
use crate::poll::poll;
use crate::templates::ProfileTemplate;
use crate::types::model::ResourceModel;
use crate::types::resources::{
    InstanceConfig, InstanceKind, InstanceSource, Readiness, RootDevice, StoragePoolConfig,
    VolumeConfig,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Where the cluster is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    /// Inside a freshly provisioned LXD instance.
    Instance(InstanceKind),

    /// Directly on the machine running cephlab. No infrastructure is provisioned.
    DirectHost,
}

impl std::fmt::Display for DeployMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance(kind) => write!(f, "{}", kind),
            Self::DirectHost => write!(f, "host"),
        }
    }
}

/// Per-run choices, typically taken from the command line.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub mode: DeployMode,
    pub image: ImageSource,
    pub expected_osds: u32,
    pub patch_replication: bool,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Preconditions,
    ProvisionInfra,
    SyncAndInstall,
    AcquireImage,
    Bootstrap,
    ConvergeCluster,
    PatchReplication,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Preconditions => "preconditions",
            Self::ProvisionInfra => "provision-infra",
            Self::SyncAndInstall => "sync-and-install",
            Self::AcquireImage => "acquire-image",
            Self::Bootstrap => "bootstrap",
            Self::ConvergeCluster => "converge-cluster",
            Self::PatchReplication => "patch-replication",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    /// Instance hosting the cluster; `None` in direct-host mode.
    pub instance: Option<String>,
    pub image: String,
    pub osd_count: u32,
    pub model_file: PathBuf,
}

/// Drives one deployment run.
pub struct InstanceOrchestrator {
    ctx: RunContext,
    config: DeployConfig,
    options: DeployOptions,
    backend: Arc<dyn VirtualizationBackend>,
    transport: Arc<dyn InstanceTransport>,
    host: Arc<dyn RemoteExecutor>,
    model: ResourceModel,
    stage: Option<Stage>,
    readiness: Readiness,
}

impl InstanceOrchestrator {
    /// Create an orchestrator for a fresh run.
    ///
    /// # Arguments
    /// * `backend` - Infrastructure API used for provisioning
    /// * `transport` - Exec/file transport into provisioned instances
    /// * `host` - Executor for the local machine (preconditions and direct-host mode)
    pub fn new(
        ctx: RunContext,
        config: DeployConfig,
        options: DeployOptions,
        backend: Arc<dyn VirtualizationBackend>,
        transport: Arc<dyn InstanceTransport>,
        host: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            ctx,
            config,
            options,
            backend,
            transport,
            host,
            model: ResourceModel::new(),
            stage: None,
            readiness: Readiness::NotReady,
        }
    }

    /// Continue from a model persisted by an earlier run. Recorded names are reused.
    pub fn with_model(mut self, restored: ResourceModel) -> Self {
        self.model.merge(&restored);
        self
    }

    pub fn model(&self) -> &ResourceModel {
        &self.model
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Last stage entered. After a failed run, the stage that failed.
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Run the pipeline until completion, failure, or Ctrl-C.
    pub async fn deploy(&mut self) -> Result<DeployReport> {
        self.deploy_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Unable to listen for Ctrl-C, interruption disabled");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the pipeline until completion, failure, or until `shutdown` resolves.
    ///
    /// The model is persisted in every case. A persistence failure after a failed
    /// run is logged and the run's own error is returned.
    #[instrument(skip_all, fields(run_id = %self.ctx.run_id(), mode = %self.options.mode))]
    pub async fn deploy_until<S>(&mut self, shutdown: S) -> Result<DeployReport>
    where
        S: Future<Output = ()>,
    {
        info!(image = %self.options.image, "Starting deployment");

        let outcome = tokio::select! {
            result = self.run_pipeline() => result,
            _ = shutdown => {
                warn!("Interrupted, stopping deployment");
                Err(CephlabError::Interrupted)
            }
        };

        match outcome {
            Ok(report) => {
                self.enter(Stage::Persist);
                self.persist()?;
                info!(osds = report.osd_count, "Deployment complete");
                Ok(report)
            }
            Err(e) => {
                // Stage stays at the one that failed.
                if let Err(pe) = self.persist() {
                    warn!(error = %pe, "Failed to persist resource model");
                }
                if let Some(stage) = self.stage {
                    error!(stage = %stage, error = %e, "Deployment failed");
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(&mut self) -> Result<DeployReport> {
        self.enter(Stage::Preconditions);
        self.check_preconditions().await?;

        let (executor, shell, instance): (Arc<dyn RemoteExecutor>, ClusterShell, Option<String>) =
            match self.options.mode {
                DeployMode::Instance(kind) => {
                    self.enter(Stage::ProvisionInfra);
                    let name = self.provision_infra(kind).await?;
                    let executor: Arc<dyn RemoteExecutor> = Arc::new(InstanceExecutor::new(
                        self.backend.clone(),
                        self.transport.clone(),
                        name.clone(),
                    ));
                    (executor.clone(), ClusterShell::on_instance(executor), Some(name))
                }
                DeployMode::DirectHost => {
                    info!("Deploying on the host, skipping infrastructure provisioning");
                    (self.host.clone(), ClusterShell::on_host(self.host.clone()), None)
                }
            };

        self.enter(Stage::SyncAndInstall);
        let repo = self.sync_and_install(executor.as_ref()).await?;

        self.enter(Stage::AcquireImage);
        let image = self.acquire_image(executor.as_ref(), &repo).await?;

        self.enter(Stage::Bootstrap);
        self.run_helper(executor.as_ref(), &repo, &["deploy_cephadm", image.as_str()]).await?;
        cluster::wait_for_control_plane(&shell, &self.config.monitor_poll).await?;

        self.enter(Stage::ConvergeCluster);
        cluster::apply_osds(&shell).await?;
        let osd_count =
            cluster::wait_for_osds(&shell, self.options.expected_osds, &self.config.osd_poll)
                .await?;

        if self.options.patch_replication {
            self.enter(Stage::PatchReplication);
            cluster::patch_replication_rule(&shell, &self.config.crush_rule).await?;
        }

        Ok(DeployReport {
            instance,
            image,
            osd_count,
            model_file: self.ctx.model_file().to_path_buf(),
        })
    }

    fn enter(&mut self, stage: Stage) {
        info!(stage = %stage, "Entering stage");
        self.stage = Some(stage);
    }

    fn persist(&self) -> Result<()> {
        self.model.save(self.ctx.model_file())?;
        info!(path = %self.ctx.model_file().display(), "Resource model saved");
        Ok(())
    }

    // Preconditions

    async fn check_preconditions(&self) -> Result<()> {
        if self.options.expected_osds == 0 {
            return Err(CephlabError::InvalidConfig {
                reason: "expected OSD count must be at least 1".to_string(),
            });
        }

        let required = match self.options.mode {
            DeployMode::Instance(_) => &self.config.instance_dependencies,
            DeployMode::DirectHost => &self.config.host_dependencies,
        };
        let missing: Vec<&str> = required
            .iter()
            .filter(|binary| paths::find_in_path(binary).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(CephlabError::precondition(format!(
                "Required binaries are not installed: {}",
                missing.join(", ")
            )));
        }

        match self.options.mode {
            DeployMode::Instance(kind) => {
                self.check_resumed_kind(kind)?;
                self.check_backend_initialized().await
            }
            DeployMode::DirectHost => {
                let deployments = cluster::existing_deployments(self.host.as_ref()).await?;
                match deployments.first() {
                    None => Ok(()),
                    Some(daemon) => Err(CephlabError::precondition(format!(
                        "A cluster is already deployed on this host (fsid {}, {} daemons)",
                        daemon.fsid,
                        deployments.len()
                    ))),
                }
            }
        }
    }

    fn check_resumed_kind(&self, kind: InstanceKind) -> Result<()> {
        match &self.model.instance {
            Some(record) if record.kind != kind => Err(CephlabError::precondition(format!(
                "Resumed model records {} {}, cannot continue as {}",
                record.kind, record.name, kind
            ))),
            _ => Ok(()),
        }
    }

    async fn check_backend_initialized(&self) -> Result<()> {
        let not_initialized = |detail: String| {
            CephlabError::precondition(format!(
                "{} is not initialized ({}), run 'lxd init --auto' first",
                self.backend.name(),
                detail
            ))
        };

        let devices = self
            .backend
            .default_profile_devices()
            .await
            .map_err(|e| not_initialized(e.to_string()))?;
        for device in ["eth0", "root"] {
            if !devices.contains_key(device) {
                return Err(not_initialized(format!("default profile has no {} device", device)));
            }
        }
        Ok(())
    }

    // Infrastructure

    #[instrument(skip(self))]
    async fn provision_infra(&mut self, kind: InstanceKind) -> Result<String> {
        let pool =
            self.model.storage_pool.clone().unwrap_or_else(|| self.ctx.deploy_tag().to_string());
        self.ensure_pool(&pool).await?;

        let profile =
            self.model.profile.clone().unwrap_or_else(|| self.ctx.deploy_tag().to_string());
        let profile_exists = self.backend.profile_exists(&profile).await?;

        let volumes = match kind {
            InstanceKind::Vm => self.ensure_volumes(&pool, &profile, profile_exists).await?,
            InstanceKind::Container => {
                info!("Containers cannot attach custom block volumes, skipping volume creation");
                Vec::new()
            }
        };

        self.ensure_profile(&profile, &pool, kind, &volumes, profile_exists).await?;

        // Kind already checked against the mode in preconditions.
        let name = match &self.model.instance {
            Some(record) => record.name.clone(),
            None => self.ctx.new_instance_name(),
        };
        self.ensure_instance(&name, kind, &pool, &profile).await?;
        self.wait_until_ready(&name).await?;
        Ok(name)
    }

    async fn ensure_pool(&mut self, name: &str) -> Result<()> {
        if self.backend.pool_exists(name).await? {
            info!(pool = %name, "Storage pool already exists, skipping creation");
        } else {
            let config = StoragePoolConfig {
                name: name.to_string(),
                driver: self.config.pool_driver.clone(),
            };
            self.backend.create_pool(&config).await?;
            info!(pool = %name, driver = %config.driver, "Storage pool created");
        }
        self.model.record_storage_pool(name);
        self.persist()
    }

    /// Volumes are only added while the profile that attaches them is still to be
    /// created. An existing profile is never modified, so its volume set is final.
    async fn ensure_volumes(
        &mut self,
        pool: &str,
        profile: &str,
        profile_exists: bool,
    ) -> Result<Vec<String>> {
        let mut names = self.model.volumes.clone();
        if profile_exists && names.len() < self.config.volume_count {
            warn!(
                profile = %profile,
                recorded = names.len(),
                configured = self.config.volume_count,
                "Profile already exists, not creating volumes it would not attach"
            );
        } else {
            while names.len() < self.config.volume_count {
                names.push(self.ctx.new_volume_name());
            }
        }

        for name in &names {
            if self.backend.volume_exists(pool, name).await? {
                info!(volume = %name, "Volume already exists, skipping creation");
            } else {
                let config =
                    VolumeConfig { name: name.clone(), size: self.config.volume_size.clone() };
                self.backend.create_volume(pool, &config).await?;
                info!(volume = %name, size = %config.size, "Volume created");
            }
            self.model.record_volume(name.clone());
            self.persist()?;
        }
        Ok(names)
    }

    async fn ensure_profile(
        &mut self,
        name: &str,
        pool: &str,
        kind: InstanceKind,
        volumes: &[String],
        exists: bool,
    ) -> Result<()> {
        if exists {
            info!(profile = %name, "Profile already exists, leaving it untouched");
        } else {
            let template = ProfileTemplate::load(kind, self.config.template_dir.as_deref())?;
            let mut profile = template.into_profile(name);
            profile.patch_volume_devices(pool, volumes);
            self.backend.create_profile(&profile).await?;
            info!(profile = %name, devices = profile.devices.len(), "Profile created");
        }
        self.model.record_profile(name);
        self.persist()
    }

    async fn ensure_instance(
        &mut self,
        name: &str,
        kind: InstanceKind,
        pool: &str,
        profile: &str,
    ) -> Result<()> {
        if self.backend.instance_exists(name).await? {
            info!(instance = %name, "Instance already exists, skipping creation");
        } else {
            let config = InstanceConfig {
                name: name.to_string(),
                kind,
                storage_pool: pool.to_string(),
                profiles: vec![profile.to_string()],
                root_device: RootDevice {
                    path: "/".to_string(),
                    pool: pool.to_string(),
                    size: self.config.root_disk_size.clone(),
                },
                source: InstanceSource {
                    alias: self.config.image_alias.clone(),
                    server: self.config.image_server.clone(),
                    protocol: self.config.image_protocol.clone(),
                },
                instance_type: match kind {
                    InstanceKind::Vm => Some(self.config.vm_flavor.clone()),
                    InstanceKind::Container => None,
                },
            };
            info!(instance = %name, kind = %kind, "Creating instance, it may take a while");
            self.backend.create_instance(&config).await?;
        }
        self.model.record_instance(name, kind);
        self.persist()?;

        let handle = self.backend.get_instance(name).await?;
        if handle.is_running() {
            info!(instance = %name, "Instance already running");
        } else {
            self.backend.start_instance(&handle).await?;
            info!(instance = %name, "Instance started");
        }
        Ok(())
    }

    async fn wait_until_ready(&mut self, name: &str) -> Result<()> {
        let executor = InstanceExecutor::new(self.backend.clone(), self.transport.clone(), name);
        let probe = argv(["ls"]);
        poll("instance readiness", &self.config.readiness_poll, || executor.run(&probe), |_| true)
            .await?;
        self.readiness = Readiness::Ready;
        info!(instance = %name, "Instance is ready");
        Ok(())
    }

    // Cluster setup

    fn helper_argv(&self, repo: &Path, args: &[&str]) -> Vec<String> {
        let script = repo.join(&self.config.helper_script);
        let mut command = vec!["bash".to_string(), script.display().to_string()];
        command.extend(args.iter().map(|a| a.to_string()));
        command
    }

    async fn run_helper(
        &self,
        executor: &dyn RemoteExecutor,
        repo: &Path,
        args: &[&str],
    ) -> Result<String> {
        let step = args.first().copied().unwrap_or_default();
        info!(target_host = %executor.describe(), step = %step, "Running helper");
        executor.run(&self.helper_argv(repo, args)).await
    }

    async fn sync_and_install(&self, executor: &dyn RemoteExecutor) -> Result<PathBuf> {
        let repo = executor
            .transfer(self.ctx.source_root(), Path::new(&self.config.remote_base_dir))
            .await?;
        info!(repo = %repo.display(), "Source tree available on target");

        self.run_helper(executor, &repo, &["install_apt"]).await?;
        Ok(repo)
    }

    async fn acquire_image(&self, executor: &dyn RemoteExecutor, repo: &Path) -> Result<String> {
        match &self.options.image {
            ImageSource::Registry(reference) => {
                if let Some(host) = insecure_registry_host(reference) {
                    info!(registry = %host, "Configuring insecure registry");
                    self.run_helper(executor, repo, &["configure_insecure_registry", host]).await?;
                }
                Ok(reference.clone())
            }
            ImageSource::Build { build_arg } => {
                let repo_arg = repo.display().to_string();
                let mut args = vec!["prep_docker"];
                if let Some(arg) = build_arg {
                    args.extend(["--build-arg", arg.as_str()]);
                }
                args.push(&repo_arg);
                self.run_helper(executor, repo, &args).await?;
                Ok(self.config.local_image.clone())
            }
            ImageSource::Archive(path) => {
                let remote =
                    executor.transfer(path, Path::new(&self.config.remote_base_dir)).await?;
                let remote = remote.display().to_string();
                self.run_helper(executor, repo, &["load_image", remote.as_str()]).await?;
                Ok(self.config.local_image.clone())
            }
        }
    }
}
