//! Shared test doubles: an in-memory LXD lab and a scripted host.
//!
//! Nothing here talks to a real LXD daemon or runs real commands.

#![allow(dead_code)]

use async_trait::async_trait;
use cephlab_core::backend::{InstanceTransport, VirtualizationBackend};
use cephlab_core::error::{CephlabError, Result};
use cephlab_core::exec::{ExecOutput, RemoteExecutor};
use cephlab_core::poll::PollPolicy;
use cephlab_core::types::{
    DeviceMap, InstanceConfig, InstanceHandle, InstanceKind, PoolHandle, ProfileConfig,
    ProfileHandle, StoragePoolConfig, VolumeConfig, VolumeHandle,
};
use cephlab_core::DeployConfig;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// `ceph status -f json` body.
pub fn status_json(osds: u32, mons: u32, mgr_available: bool) -> String {
    format!(
        r#"{{"fsid":"c0ffee","osdmap":{{"num_osds":{}}},"monmap":{{"num_mons":{}}},"mgrmap":{{"available":{}}}}}"#,
        osds, mons, mgr_available
    )
}

/// Config with fast polls and no host binary requirements.
pub fn test_config() -> DeployConfig {
    DeployConfig {
        readiness_poll: PollPolicy::new(Duration::from_secs(1), 3),
        monitor_poll: PollPolicy::new(Duration::from_secs(30), 10),
        osd_poll: PollPolicy::new(Duration::from_secs(60), 10),
        instance_dependencies: vec![],
        host_dependencies: vec![],
        ..Default::default()
    }
}

/// Scripted command responses shared by the instance transport and the host.
#[derive(Default)]
pub struct CommandScript {
    /// Successive `ceph status` outputs; the last one repeats.
    statuses: VecDeque<String>,
    /// (substring of the joined argv, response); first match wins.
    outputs: Vec<(String, ExecOutput)>,
    log: Vec<String>,
}

impl CommandScript {
    fn respond(&mut self, argv: &[String]) -> ExecOutput {
        let command = argv.join(" ");
        self.log.push(command.clone());

        if command.contains("ceph status") {
            let stdout = if self.statuses.len() > 1 {
                self.statuses.pop_front().unwrap_or_default()
            } else {
                self.statuses.front().cloned().unwrap_or_else(|| "{}".to_string())
            };
            return ExecOutput { stdout, ..Default::default() };
        }

        self.outputs
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct LabState {
    pools: BTreeSet<String>,
    volumes: BTreeSet<(String, String)>,
    profiles: BTreeMap<String, ProfileConfig>,
    instances: BTreeMap<String, (InstanceConfig, bool)>,
    calls: Vec<String>,
    pushes: Vec<String>,
    fail_on: BTreeSet<String>,
    script: CommandScript,
}

/// In-memory LXD: both the infrastructure API and the exec transport.
pub struct MockLab {
    state: Mutex<LabState>,
}

impl MockLab {
    /// A lab whose default profile looks like `lxd init --auto` ran.
    pub fn new() -> Self {
        let lab = Self::uninitialized();
        let default = ProfileConfig {
            name: "default".to_string(),
            config: BTreeMap::new(),
            devices: BTreeMap::from([
                ("eth0".to_string(), DeviceMap::from([("type".to_string(), "nic".to_string())])),
                ("root".to_string(), DeviceMap::from([("type".to_string(), "disk".to_string())])),
            ]),
        };
        lab.state.lock().unwrap().profiles.insert("default".to_string(), default);
        lab
    }

    pub fn uninitialized() -> Self {
        Self { state: Mutex::new(LabState::default()) }
    }

    pub fn with_pool(self, name: &str) -> Self {
        self.state.lock().unwrap().pools.insert(name.to_string());
        self
    }

    pub fn with_volume(self, pool: &str, name: &str) -> Self {
        self.state.lock().unwrap().volumes.insert((pool.to_string(), name.to_string()));
        self
    }

    pub fn with_profile(self, name: &str) -> Self {
        let profile = ProfileConfig {
            name: name.to_string(),
            config: BTreeMap::new(),
            devices: BTreeMap::new(),
        };
        self.state.lock().unwrap().profiles.insert(name.to_string(), profile);
        self
    }

    pub fn with_instance(self, name: &str, kind: InstanceKind, running: bool) -> Self {
        let config = InstanceConfig {
            name: name.to_string(),
            kind,
            storage_pool: String::new(),
            profiles: vec![],
            root_device: cephlab_core::types::RootDevice {
                path: "/".to_string(),
                pool: String::new(),
                size: String::new(),
            },
            source: cephlab_core::types::InstanceSource {
                alias: String::new(),
                server: String::new(),
                protocol: String::new(),
            },
            instance_type: None,
        };
        self.state.lock().unwrap().instances.insert(name.to_string(), (config, running));
        self
    }

    /// Make the named operation (e.g. `create_profile`) fail with a backend error.
    pub fn failing_on(self, operation: &str) -> Self {
        self.state.lock().unwrap().fail_on.insert(operation.to_string());
        self
    }

    pub fn with_statuses<I: IntoIterator<Item = String>>(self, statuses: I) -> Self {
        self.state.lock().unwrap().script.statuses.extend(statuses);
        self
    }

    pub fn with_output(self, pattern: &str, stdout: &str) -> Self {
        let output = ExecOutput { stdout: stdout.to_string(), ..Default::default() };
        self.state.lock().unwrap().script.outputs.push((pattern.to_string(), output));
        self
    }

    pub fn with_failing_command(self, pattern: &str) -> Self {
        let output =
            ExecOutput { stderr: "mock failure".to_string(), exit_code: 1, ..Default::default() };
        self.state.lock().unwrap().script.outputs.push((pattern.to_string(), output));
        self
    }

    /// Mutating backend calls, e.g. `create_pool:ubuntu-ceph-TEST`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    /// Commands executed in instances, argv joined with spaces.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().script.log.clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.state.lock().unwrap().pushes.clone()
    }

    pub fn profile(&self, name: &str) -> Option<ProfileConfig> {
        self.state.lock().unwrap().profiles.get(name).cloned()
    }

    pub fn instance(&self, name: &str) -> Option<InstanceConfig> {
        self.state.lock().unwrap().instances.get(name).map(|(c, _)| c.clone())
    }

    pub fn pool_count(&self) -> usize {
        self.state.lock().unwrap().pools.len()
    }

    fn mutate(&self, operation: &str, name: &str) -> Result<std::sync::MutexGuard<'_, LabState>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.contains(operation) {
            return Err(CephlabError::backend(operation, "injected failure"));
        }
        state.calls.push(format!("{}:{}", operation, name));
        Ok(state)
    }

    fn not_found(kind: &str, name: &str) -> CephlabError {
        CephlabError::NotFound { kind: kind.to_string(), name: name.to_string() }
    }
}

#[async_trait]
impl VirtualizationBackend for MockLab {
    async fn pool_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().pools.contains(name))
    }

    async fn create_pool(&self, config: &StoragePoolConfig) -> Result<PoolHandle> {
        self.mutate("create_pool", &config.name)?.pools.insert(config.name.clone());
        Ok(PoolHandle { name: config.name.clone(), driver: config.driver.clone() })
    }

    async fn get_pool(&self, name: &str) -> Result<PoolHandle> {
        if self.state.lock().unwrap().pools.contains(name) {
            Ok(PoolHandle { name: name.to_string(), driver: "dir".to_string() })
        } else {
            Err(Self::not_found("storage pool", name))
        }
    }

    async fn delete_pool(&self, pool: &PoolHandle) -> Result<()> {
        self.mutate("delete_pool", &pool.name)?.pools.remove(&pool.name);
        Ok(())
    }

    /// Like LXD, a volume in a missing pool does not exist.
    async fn volume_exists(&self, pool: &str, name: &str) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.pools.contains(pool)
            && state.volumes.contains(&(pool.to_string(), name.to_string())))
    }

    async fn create_volume(&self, pool: &str, config: &VolumeConfig) -> Result<VolumeHandle> {
        let mut state = self.mutate("create_volume", &format!("{}/{}", pool, config.name))?;
        if !state.pools.contains(pool) {
            return Err(Self::not_found("storage pool", pool));
        }
        state.volumes.insert((pool.to_string(), config.name.clone()));
        Ok(VolumeHandle { pool: pool.to_string(), name: config.name.clone() })
    }

    async fn get_volume(&self, pool: &str, name: &str) -> Result<VolumeHandle> {
        if self.volume_exists(pool, name).await? {
            Ok(VolumeHandle { pool: pool.to_string(), name: name.to_string() })
        } else {
            Err(Self::not_found("volume", name))
        }
    }

    async fn delete_volume(&self, volume: &VolumeHandle) -> Result<()> {
        self.mutate("delete_volume", &format!("{}/{}", volume.pool, volume.name))?
            .volumes
            .remove(&(volume.pool.clone(), volume.name.clone()));
        Ok(())
    }

    async fn profile_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().profiles.contains_key(name))
    }

    async fn create_profile(&self, config: &ProfileConfig) -> Result<ProfileHandle> {
        self.mutate("create_profile", &config.name)?
            .profiles
            .insert(config.name.clone(), config.clone());
        Ok(ProfileHandle { name: config.name.clone(), devices: config.devices.clone() })
    }

    async fn get_profile(&self, name: &str) -> Result<ProfileHandle> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(name)
            .map(|p| ProfileHandle { name: p.name.clone(), devices: p.devices.clone() })
            .ok_or_else(|| Self::not_found("profile", name))
    }

    async fn delete_profile(&self, profile: &ProfileHandle) -> Result<()> {
        self.mutate("delete_profile", &profile.name)?.profiles.remove(&profile.name);
        Ok(())
    }

    async fn instance_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().instances.contains_key(name))
    }

    async fn create_instance(&self, config: &InstanceConfig) -> Result<InstanceHandle> {
        self.mutate("create_instance", &config.name)?
            .instances
            .insert(config.name.clone(), (config.clone(), false));
        Ok(InstanceHandle {
            name: config.name.clone(),
            kind: config.kind,
            status: "Stopped".to_string(),
        })
    }

    async fn get_instance(&self, name: &str) -> Result<InstanceHandle> {
        self.state
            .lock()
            .unwrap()
            .instances
            .get(name)
            .map(|(config, running)| InstanceHandle {
                name: name.to_string(),
                kind: config.kind,
                status: if *running { "Running" } else { "Stopped" }.to_string(),
            })
            .ok_or_else(|| Self::not_found("instance", name))
    }

    async fn start_instance(&self, instance: &InstanceHandle) -> Result<()> {
        let mut state = self.mutate("start_instance", &instance.name)?;
        if let Some(entry) = state.instances.get_mut(&instance.name) {
            entry.1 = true;
        }
        Ok(())
    }

    async fn stop_instance(&self, instance: &InstanceHandle) -> Result<()> {
        let mut state = self.mutate("stop_instance", &instance.name)?;
        if let Some(entry) = state.instances.get_mut(&instance.name) {
            entry.1 = false;
        }
        Ok(())
    }

    async fn delete_instance(&self, instance: &InstanceHandle) -> Result<()> {
        self.mutate("delete_instance", &instance.name)?.instances.remove(&instance.name);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock-lxd"
    }
}

#[async_trait]
impl InstanceTransport for MockLab {
    async fn execute(&self, instance: &str, argv: &[String]) -> Result<ExecOutput> {
        let mut state = self.state.lock().unwrap();
        if !state.instances.get(instance).map(|(_, running)| *running).unwrap_or(false) {
            return Ok(ExecOutput {
                stderr: format!("Instance is not running: {}", instance),
                exit_code: 1,
                ..Default::default()
            });
        }
        Ok(state.script.respond(argv))
    }

    async fn push_recursive(&self, instance: &str, source: &Path, target_dir: &str) -> Result<()> {
        let push = format!("{} -> {}{}", source.display(), instance, target_dir);
        self.state.lock().unwrap().pushes.push(push);
        Ok(())
    }
}

/// Host executor answering from a script. Transfers are the identity.
pub struct MockHost {
    script: Mutex<CommandScript>,
}

impl MockHost {
    pub fn new() -> Self {
        Self { script: Mutex::new(CommandScript::default()) }
    }

    pub fn with_statuses<I: IntoIterator<Item = String>>(self, statuses: I) -> Self {
        self.script.lock().unwrap().statuses.extend(statuses);
        self
    }

    pub fn with_output(self, pattern: &str, stdout: &str) -> Self {
        let output = ExecOutput { stdout: stdout.to_string(), ..Default::default() };
        self.script.lock().unwrap().outputs.push((pattern.to_string(), output));
        self
    }

    pub fn with_failing_command(self, pattern: &str) -> Self {
        self.with_exit(pattern, 1, "not found")
    }

    pub fn with_exit(self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        let output = ExecOutput { stderr: stderr.to_string(), exit_code, ..Default::default() };
        self.script.lock().unwrap().outputs.push((pattern.to_string(), output));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.lock().unwrap().log.clone()
    }
}

#[async_trait]
impl RemoteExecutor for MockHost {
    async fn run(&self, argv: &[String]) -> Result<String> {
        let output = self.script.lock().unwrap().respond(argv);
        output.into_stdout(argv)
    }

    async fn transfer(&self, source: &Path, _target_dir: &Path) -> Result<PathBuf> {
        Ok(source.to_path_buf())
    }

    fn describe(&self) -> String {
        "mock host".to_string()
    }
}
