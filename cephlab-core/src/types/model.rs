//! Resource model: the persisted record of everything a run created.
//!
//! The model only ever holds resource names. Live handles are resolved on demand
//! through the virtualization backend.

use crate::error::{CephlabError, Result};
use crate::types::resources::InstanceKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Instance entry of the resource model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    pub kind: InstanceKind,
}

/// Record of the resources created by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedModel", into = "PersistedModel")]
pub struct ResourceModel {
    pub storage_pool: Option<String>,
    pub profile: Option<String>,
    pub instance: Option<InstanceRecord>,
    pub volumes: Vec<String>,
}

/// On-disk layout. The instance key is kind-aware (`vm_name` / `container_name`).
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    storage_pool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    vm_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    container_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
}

impl From<PersistedModel> for ResourceModel {
    fn from(p: PersistedModel) -> Self {
        // A file carrying both keys can only come from manual edits; the VM wins.
        let instance = match (p.vm_name, p.container_name) {
            (Some(name), _) => Some(InstanceRecord { name, kind: InstanceKind::Vm }),
            (None, Some(name)) => Some(InstanceRecord { name, kind: InstanceKind::Container }),
            (None, None) => None,
        };
        Self { storage_pool: p.storage_pool, profile: p.profile, instance, volumes: p.volumes }
    }
}

impl From<ResourceModel> for PersistedModel {
    fn from(m: ResourceModel) -> Self {
        let (vm_name, container_name) = match m.instance {
            Some(InstanceRecord { name, kind: InstanceKind::Vm }) => (Some(name), None),
            Some(InstanceRecord { name, kind: InstanceKind::Container }) => (None, Some(name)),
            None => (None, None),
        };
        Self {
            storage_pool: m.storage_pool,
            profile: m.profile,
            vm_name,
            container_name,
            volumes: m.volumes,
        }
    }
}

impl ResourceModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.storage_pool.is_none()
            && self.profile.is_none()
            && self.instance.is_none()
            && self.volumes.is_empty()
    }

    pub fn record_storage_pool(&mut self, name: impl Into<String>) {
        self.storage_pool = Some(name.into());
    }

    pub fn record_profile(&mut self, name: impl Into<String>) {
        self.profile = Some(name.into());
    }

    pub fn record_instance(&mut self, name: impl Into<String>, kind: InstanceKind) {
        self.instance = Some(InstanceRecord { name: name.into(), kind });
    }

    /// Append a volume name, ignoring duplicates.
    pub fn record_volume(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.volumes.contains(&name) {
            self.volumes.push(name);
        }
    }

    /// Fill keys missing from `self` with the values in `other`.
    ///
    /// Present keys are never overwritten; volumes are unioned in order.
    pub fn merge(&mut self, other: &ResourceModel) {
        if self.storage_pool.is_none() {
            self.storage_pool = other.storage_pool.clone();
        }
        if self.profile.is_none() {
            self.profile = other.profile.clone();
        }
        if self.instance.is_none() {
            self.instance = other.instance.clone();
        }
        for volume in &other.volumes {
            self.record_volume(volume.clone());
        }
    }

    /// Render as JSON with 4-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).map_err(|e| CephlabError::InvalidConfig {
            reason: format!("Failed to serialize resource model: {}", e),
        })?;
        String::from_utf8(buf).map_err(|e| CephlabError::Other(e.into()))
    }

    /// Write the model to `path`, replacing any previous content.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        std::fs::write(path, content)
            .map_err(|e| CephlabError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Read a model previously written by [`ResourceModel::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CephlabError::IoError { path: path.to_path_buf(), source: e })?;
        serde_json::from_str(&content).map_err(|e| CephlabError::InvalidConfig {
            reason: format!("Failed to parse resource model {}: {}", path.display(), e),
        })
    }
}
