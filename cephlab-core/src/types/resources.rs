//! Virtualization resource types: pools, volumes, profiles, instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instance kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    /// Full virtual machine
    #[default]
    Vm,

    /// System container sharing the host kernel
    Container,
}

impl InstanceKind {
    /// Instance type string understood by the LXD API.
    pub fn api_type(&self) -> &'static str {
        match self {
            Self::Vm => "virtual-machine",
            Self::Container => "container",
        }
    }

    /// Parse from an LXD instance type string.
    pub fn from_api_type(s: &str) -> Option<Self> {
        match s {
            "virtual-machine" => Some(Self::Vm),
            "container" => Some(Self::Container),
            _ => None,
        }
    }
}

impl std::fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vm => write!(f, "vm"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// Storage pool creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePoolConfig {
    /// Pool name
    pub name: String,

    /// Storage driver (e.g., "dir", "zfs")
    pub driver: String,
}

/// Handle to an existing storage pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHandle {
    pub name: String,
    pub driver: String,
}

/// Custom block volume creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Volume name
    pub name: String,

    /// Volume size (e.g., "10GB")
    pub size: String,
}

/// Handle to an existing volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHandle {
    /// Owning pool
    pub pool: String,

    /// Volume name
    pub name: String,
}

/// A single profile/instance device: LXD devices are flat string maps.
pub type DeviceMap = BTreeMap<String, String>;

/// Profile creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile name
    pub name: String,

    /// Instance configuration keys (limits, security options)
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Devices keyed by device name
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceMap>,
}

impl ProfileConfig {
    /// Add one disk device per volume, named after the volume.
    pub fn patch_volume_devices(&mut self, pool: &str, volumes: &[String]) {
        for volume in volumes {
            let device = DeviceMap::from([
                ("pool".to_string(), pool.to_string()),
                ("source".to_string(), volume.clone()),
                ("type".to_string(), "disk".to_string()),
            ]);
            self.devices.insert(volume.clone(), device);
        }
    }
}

/// Handle to an existing profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHandle {
    pub name: String,
    pub devices: BTreeMap<String, DeviceMap>,
}

/// Root disk of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDevice {
    pub path: String,
    pub pool: String,
    pub size: String,
}

/// Image source of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSource {
    /// Image alias (e.g., "ubuntu/jammy")
    pub alias: String,

    /// Image server URL
    pub server: String,

    /// Image server protocol (e.g., "simplestreams")
    pub protocol: String,
}

/// Instance creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance name
    pub name: String,

    /// VM or container
    pub kind: InstanceKind,

    /// Storage pool holding the root disk
    pub storage_pool: String,

    /// Applied profiles, in order
    pub profiles: Vec<String>,

    /// Root disk
    pub root_device: RootDevice,

    /// Image to pull
    pub source: InstanceSource,

    /// Instance type (flavor), VMs only
    pub instance_type: Option<String>,
}

/// Handle to an existing instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub name: String,
    pub kind: InstanceKind,

    /// Backend-reported status (e.g., "Running", "Stopped")
    pub status: String,
}

impl InstanceHandle {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

/// Readiness of a provisioned instance.
///
/// Moves from `NotReady` to `Ready` once the readiness probe succeeds and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
}
