//! Core domain types for cephlab.

pub mod cluster;
pub mod model;
pub mod resources;

// Re-exports
pub use cluster::{ClusterStatus, CephadmDaemon, CrushRule};
pub use model::{InstanceRecord, ResourceModel};
pub use resources::{
    DeviceMap, InstanceConfig, InstanceHandle, InstanceKind, InstanceSource, PoolHandle,
    ProfileConfig, ProfileHandle, Readiness, RootDevice, StoragePoolConfig, VolumeConfig,
    VolumeHandle,
};
