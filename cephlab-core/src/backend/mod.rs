//! Virtualization backend abstraction.
//!
//! cephlab provisions its lab through two capabilities:
//! - `VirtualizationBackend`: idempotent-friendly CRUD over pools, volumes, profiles
//!   and instances. Every mutating call blocks until the backend reports completion.
//! - `InstanceTransport`: command execution and file transfer into an instance.
//!
//! The only shipped implementation is [`LxdBackend`], which provides both.

use crate::error::Result;
use crate::exec::ExecOutput;
use crate::types::resources::{
    DeviceMap, InstanceConfig, InstanceHandle, PoolHandle, ProfileConfig, ProfileHandle,
    StoragePoolConfig, VolumeConfig, VolumeHandle,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

pub mod lxd;

pub use lxd::LxdBackend;

/// Infrastructure API used by the orchestrator and the cleaner.
///
/// `get_*` fails with `NotFound` when the resource is absent. `delete_*` is not
/// idempotent on its own: callers re-check `*_exists` immediately before.
#[async_trait]
pub trait VirtualizationBackend: Send + Sync {
    async fn pool_exists(&self, name: &str) -> Result<bool>;

    /// Create a storage pool and wait for completion.
    async fn create_pool(&self, config: &StoragePoolConfig) -> Result<PoolHandle>;

    async fn get_pool(&self, name: &str) -> Result<PoolHandle>;

    async fn delete_pool(&self, pool: &PoolHandle) -> Result<()>;

    async fn volume_exists(&self, pool: &str, name: &str) -> Result<bool>;

    /// Create a custom block volume in `pool` and wait for completion.
    async fn create_volume(&self, pool: &str, config: &VolumeConfig) -> Result<VolumeHandle>;

    async fn get_volume(&self, pool: &str, name: &str) -> Result<VolumeHandle>;

    async fn delete_volume(&self, volume: &VolumeHandle) -> Result<()>;

    async fn profile_exists(&self, name: &str) -> Result<bool>;

    async fn create_profile(&self, config: &ProfileConfig) -> Result<ProfileHandle>;

    async fn get_profile(&self, name: &str) -> Result<ProfileHandle>;

    async fn delete_profile(&self, profile: &ProfileHandle) -> Result<()>;

    /// Devices of the `default` profile. An initialized LXD has at least a NIC and a root disk.
    async fn default_profile_devices(&self) -> Result<BTreeMap<String, DeviceMap>> {
        Ok(self.get_profile("default").await?.devices)
    }

    async fn instance_exists(&self, name: &str) -> Result<bool>;

    /// Create an instance (pulling its image if needed) and wait for completion.
    ///
    /// The instance is left stopped.
    async fn create_instance(&self, config: &InstanceConfig) -> Result<InstanceHandle>;

    async fn get_instance(&self, name: &str) -> Result<InstanceHandle>;

    /// Start an instance and wait until the backend reports it running.
    async fn start_instance(&self, instance: &InstanceHandle) -> Result<()>;

    /// Stop an instance and wait until the backend reports it stopped.
    async fn stop_instance(&self, instance: &InstanceHandle) -> Result<()>;

    async fn delete_instance(&self, instance: &InstanceHandle) -> Result<()>;

    /// Backend name (for logging).
    fn name(&self) -> &str;
}

/// Remote-exec transport into a named instance.
#[async_trait]
pub trait InstanceTransport: Send + Sync {
    /// Run `argv` inside `instance`, capturing output.
    ///
    /// A nonzero exit status is reported in the returned output, not as an error.
    async fn execute(&self, instance: &str, argv: &[String]) -> Result<ExecOutput>;

    /// Recursively copy `source` into `target_dir` inside `instance`.
    async fn push_recursive(&self, instance: &str, source: &Path, target_dir: &str) -> Result<()>;
}
