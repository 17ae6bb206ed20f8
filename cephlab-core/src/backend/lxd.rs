//! LXD backend.
//!
//! Talks to the LXD REST API through the `lxc` client:
//! - CRUD: `lxc query [--wait] -X <METHOD> [--data <json>] <path>`
//! - Exec: `lxc exec <instance> -- <argv>`
//! - Transfer: `lxc file push <src> <instance><dir> -r`
//!
//! `--wait` makes `lxc query` block on the background operation LXD returns for
//! mutating calls, so every create/start/stop/delete here is synchronous.

use crate::backend::{InstanceTransport, VirtualizationBackend};
use crate::error::{CephlabError, Result};
use crate::exec::ExecOutput;
use crate::paths;
use crate::types::resources::{
    DeviceMap, InstanceConfig, InstanceHandle, InstanceKind, PoolHandle, ProfileConfig,
    ProfileHandle, StoragePoolConfig, VolumeConfig, VolumeHandle,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// LXD backend driven by the `lxc` client binary.
pub struct LxdBackend {
    /// Path to the lxc binary
    binary_path: PathBuf,
}

impl LxdBackend {
    /// Create a backend using the `lxc` binary found on `PATH`.
    pub fn new() -> Result<Self> {
        let binary_path = Self::find_binary()?;
        Ok(Self { binary_path })
    }

    /// Create a backend using an explicit `lxc` binary.
    pub fn with_binary(binary_path: impl Into<PathBuf>) -> Self {
        Self { binary_path: binary_path.into() }
    }

    /// Find the lxc binary on PATH, falling back to the snap location.
    fn find_binary() -> Result<PathBuf> {
        if let Some(path) = paths::find_in_path("lxc") {
            return Ok(path);
        }

        let snap = PathBuf::from("/snap/bin/lxc");
        if snap.exists() {
            return Ok(snap);
        }

        Err(CephlabError::precondition("lxc client not found; install the lxd snap"))
    }

    /// Perform one REST call through `lxc query`.
    ///
    /// Returns the response metadata (`Value::Null` for empty responses).
    async fn query(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value> {
        let operation = format!("{} {}", method, path);
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("query");
        if method != "GET" {
            cmd.arg("--wait");
        }
        cmd.args(["-X", method]);
        if let Some(body) = body {
            cmd.arg("--data").arg(body.to_string());
        }
        cmd.arg(path);

        debug!(%operation, "lxc query");
        let output = cmd.output().await.map_err(|e| CephlabError::backend(&operation, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CephlabError::backend(&operation, stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .map_err(|e| CephlabError::backend(&operation, format!("invalid JSON response: {}", e)))
    }

    /// List the names in a collection endpoint (e.g. `/1.0/profiles`).
    async fn list_names(&self, collection: &str) -> Result<Vec<String>> {
        let value = self.query("GET", collection, None).await?;
        let urls: Vec<String> = serde_json::from_value(value).map_err(|e| {
            let operation = format!("GET {}", collection);
            CephlabError::backend(operation, format!("expected URL list: {}", e))
        })?;
        Ok(urls.iter().map(|url| name_from_url(url)).collect())
    }

    fn ensure_exists(exists: bool, kind: &str, name: &str) -> Result<()> {
        if exists {
            Ok(())
        } else {
            Err(CephlabError::NotFound { kind: kind.to_string(), name: name.to_string() })
        }
    }

    async fn change_state(&self, instance: &InstanceHandle, action: &str) -> Result<()> {
        let path = format!("/1.0/instances/{}/state", instance.name);
        self.query("PUT", &path, Some(&json!({ "action": action, "timeout": -1 }))).await?;
        Ok(())
    }
}

#[async_trait]
impl VirtualizationBackend for LxdBackend {
    async fn pool_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_names("/1.0/storage-pools").await?.iter().any(|n| n == name))
    }

    #[instrument(skip(self), fields(pool = %config.name))]
    async fn create_pool(&self, config: &StoragePoolConfig) -> Result<PoolHandle> {
        info!(driver = %config.driver, "Creating storage pool");
        self.query("POST", "/1.0/storage-pools", Some(&pool_payload(config))).await?;
        Ok(PoolHandle { name: config.name.clone(), driver: config.driver.clone() })
    }

    async fn get_pool(&self, name: &str) -> Result<PoolHandle> {
        Self::ensure_exists(self.pool_exists(name).await?, "storage pool", name)?;
        let value = self.query("GET", &format!("/1.0/storage-pools/{}", name), None).await?;
        let driver = value.get("driver").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(PoolHandle { name: name.to_string(), driver })
    }

    #[instrument(skip(self), fields(pool = %pool.name))]
    async fn delete_pool(&self, pool: &PoolHandle) -> Result<()> {
        info!("Deleting storage pool");
        self.query("DELETE", &format!("/1.0/storage-pools/{}", pool.name), None).await?;
        Ok(())
    }

    async fn volume_exists(&self, pool: &str, name: &str) -> Result<bool> {
        if !self.pool_exists(pool).await? {
            return Ok(false);
        }
        let collection = format!("/1.0/storage-pools/{}/volumes/custom", pool);
        Ok(self.list_names(&collection).await?.iter().any(|n| n == name))
    }

    #[instrument(skip(self), fields(volume = %config.name))]
    async fn create_volume(&self, pool: &str, config: &VolumeConfig) -> Result<VolumeHandle> {
        info!(pool, size = %config.size, "Creating storage volume");
        let path = format!("/1.0/storage-pools/{}/volumes/custom", pool);
        self.query("POST", &path, Some(&volume_payload(config))).await?;
        Ok(VolumeHandle { pool: pool.to_string(), name: config.name.clone() })
    }

    async fn get_volume(&self, pool: &str, name: &str) -> Result<VolumeHandle> {
        Self::ensure_exists(self.volume_exists(pool, name).await?, "volume", name)?;
        Ok(VolumeHandle { pool: pool.to_string(), name: name.to_string() })
    }

    #[instrument(skip(self), fields(volume = %volume.name))]
    async fn delete_volume(&self, volume: &VolumeHandle) -> Result<()> {
        info!(pool = %volume.pool, "Deleting storage volume");
        let path = format!("/1.0/storage-pools/{}/volumes/custom/{}", volume.pool, volume.name);
        self.query("DELETE", &path, None).await?;
        Ok(())
    }

    async fn profile_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_names("/1.0/profiles").await?.iter().any(|n| n == name))
    }

    #[instrument(skip(self), fields(profile = %config.name))]
    async fn create_profile(&self, config: &ProfileConfig) -> Result<ProfileHandle> {
        info!(devices = config.devices.len(), "Creating profile");
        self.query("POST", "/1.0/profiles", Some(&profile_payload(config))).await?;
        Ok(ProfileHandle { name: config.name.clone(), devices: config.devices.clone() })
    }

    async fn get_profile(&self, name: &str) -> Result<ProfileHandle> {
        Self::ensure_exists(self.profile_exists(name).await?, "profile", name)?;
        let value = self.query("GET", &format!("/1.0/profiles/{}", name), None).await?;
        Ok(ProfileHandle { name: name.to_string(), devices: parse_devices(&value) })
    }

    #[instrument(skip(self), fields(profile = %profile.name))]
    async fn delete_profile(&self, profile: &ProfileHandle) -> Result<()> {
        info!("Deleting profile");
        self.query("DELETE", &format!("/1.0/profiles/{}", profile.name), None).await?;
        Ok(())
    }

    async fn instance_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_names("/1.0/instances").await?.iter().any(|n| n == name))
    }

    #[instrument(skip(self), fields(instance = %config.name, kind = %config.kind))]
    async fn create_instance(&self, config: &InstanceConfig) -> Result<InstanceHandle> {
        info!(image = %config.source.alias, "Creating instance");
        self.query("POST", "/1.0/instances", Some(&instance_payload(config))).await?;
        Ok(InstanceHandle {
            name: config.name.clone(),
            kind: config.kind,
            status: "Stopped".to_string(),
        })
    }

    async fn get_instance(&self, name: &str) -> Result<InstanceHandle> {
        Self::ensure_exists(self.instance_exists(name).await?, "instance", name)?;
        let value = self.query("GET", &format!("/1.0/instances/{}", name), None).await?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .and_then(InstanceKind::from_api_type)
            .unwrap_or_default();
        let status = value.get("status").and_then(Value::as_str).unwrap_or("Unknown").to_string();
        Ok(InstanceHandle { name: name.to_string(), kind, status })
    }

    #[instrument(skip(self), fields(instance = %instance.name))]
    async fn start_instance(&self, instance: &InstanceHandle) -> Result<()> {
        info!("Starting instance");
        self.change_state(instance, "start").await
    }

    #[instrument(skip(self), fields(instance = %instance.name))]
    async fn stop_instance(&self, instance: &InstanceHandle) -> Result<()> {
        info!("Stopping instance");
        self.change_state(instance, "stop").await
    }

    #[instrument(skip(self), fields(instance = %instance.name))]
    async fn delete_instance(&self, instance: &InstanceHandle) -> Result<()> {
        info!("Deleting instance");
        self.query("DELETE", &format!("/1.0/instances/{}", instance.name), None).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "lxd"
    }
}

#[async_trait]
impl InstanceTransport for LxdBackend {
    #[instrument(skip(self, argv), fields(command = %argv.join(" ")))]
    async fn execute(&self, instance: &str, argv: &[String]) -> Result<ExecOutput> {
        let output = Command::new(&self.binary_path)
            .args(["exec", instance, "--"])
            .args(argv)
            .output()
            .await
            .map_err(|e| CephlabError::backend(format!("exec on {}", instance), e))?;

        Ok(ExecOutput::from(output))
    }

    #[instrument(skip(self))]
    async fn push_recursive(&self, instance: &str, source: &Path, target_dir: &str) -> Result<()> {
        let target = format!("{}{}", instance, target_dir);
        let transfer_err = |reason: String| CephlabError::TransferFailed {
            source_path: source.to_path_buf(),
            target: target.clone(),
            reason,
        };

        info!("Pushing files");
        let output = Command::new(&self.binary_path)
            .args(["file", "push"])
            .arg(source)
            .arg(&target)
            .arg("-r")
            .output()
            .await
            .map_err(|e| transfer_err(e.to_string()))?;

        if !output.status.success() {
            return Err(transfer_err(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(())
    }
}

/// Extract the resource name from an LXD URL such as `/1.0/instances/foo?project=x`.
fn name_from_url(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path).to_string()
}

fn pool_payload(config: &StoragePoolConfig) -> Value {
    json!({ "name": config.name, "driver": config.driver })
}

fn volume_payload(config: &VolumeConfig) -> Value {
    json!({
        "name": config.name,
        "type": "custom",
        "content_type": "block",
        "config": { "size": config.size },
    })
}

fn profile_payload(config: &ProfileConfig) -> Value {
    json!({ "name": config.name, "config": config.config, "devices": config.devices })
}

fn instance_payload(config: &InstanceConfig) -> Value {
    let mut payload = json!({
        "name": config.name,
        "type": config.kind.api_type(),
        "profiles": config.profiles,
        "devices": {
            "root": {
                "path": config.root_device.path,
                "pool": config.root_device.pool,
                "size": config.root_device.size,
                "type": "disk",
            }
        },
        "source": {
            "type": "image",
            "alias": config.source.alias,
            "server": config.source.server,
            "protocol": config.source.protocol,
            "mode": "pull",
        },
    });
    if let Some(instance_type) = &config.instance_type {
        payload["instance_type"] = json!(instance_type);
    }
    payload
}

/// Read the `devices` map of a profile, keeping only string-valued keys.
fn parse_devices(profile: &Value) -> BTreeMap<String, DeviceMap> {
    let Some(devices) = profile.get("devices").and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    devices
        .iter()
        .map(|(name, device)| {
            let map = device
                .as_object()
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            (name.clone(), map)
        })
        .collect()
}
