//! Profile templates.
//!
//! A template is a YAML mapping with `config` and `devices` keys. The built-in
//! templates can be overridden per kind by placing `vm_profile.yaml` or
//! `container_profile.yaml` in the configured template directory.

mod builtin;

use crate::error::{CephlabError, Result};
use crate::types::resources::{DeviceMap, InstanceKind, ProfileConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};

pub use builtin::{CONTAINER_PROFILE, VM_PROFILE};

/// Deserialized profile template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileTemplate {
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    #[serde(default)]
    pub devices: BTreeMap<String, DeviceMap>,
}

impl ProfileTemplate {
    /// Parse a template from YAML.
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CephlabError::TemplateError {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Load the template for `kind`, preferring an override in `dir`.
    #[instrument]
    pub fn load(kind: InstanceKind, dir: Option<&Path>) -> Result<Self> {
        let file_name = Self::file_name(kind);

        if let Some(path) = dir.map(|d| d.join(file_name)).filter(|p| p.exists()) {
            debug!(path = %path.display(), "Using profile template override");
            let content = std::fs::read_to_string(&path)
                .map_err(|e| CephlabError::IoError { path: path.clone(), source: e })?;
            return Self::parse(file_name, &content);
        }

        let builtin = match kind {
            InstanceKind::Vm => VM_PROFILE,
            InstanceKind::Container => CONTAINER_PROFILE,
        };
        Self::parse(file_name, builtin)
    }

    pub fn file_name(kind: InstanceKind) -> &'static str {
        match kind {
            InstanceKind::Vm => "vm_profile.yaml",
            InstanceKind::Container => "container_profile.yaml",
        }
    }

    /// Instantiate as a named profile.
    pub fn into_profile(self, name: impl Into<String>) -> ProfileConfig {
        ProfileConfig { name: name.into(), config: self.config, devices: self.devices }
    }
}
