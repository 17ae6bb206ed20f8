//! Configuration management.

use crate::error::{CephlabError, Result};
use crate::paths;
use crate::poll::PollPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables of a deployment. Every field has a default matching the stock lab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub pool_driver: String,
    pub volume_count: usize,
    pub volume_size: String,
    pub image_alias: String,
    pub image_server: String,
    pub image_protocol: String,
    /// Instance type applied to VMs
    pub vm_flavor: String,
    pub root_disk_size: String,
    /// Helper script, relative to the repository root
    pub helper_script: String,
    /// Image bootstrapped when it is built or loaded locally
    pub local_image: String,
    /// Directory on an instance the source tree is pushed into
    pub remote_base_dir: String,
    /// Crush rule created by the single-node replication patch
    pub crush_rule: String,
    /// Directory holding `vm_profile.yaml` / `container_profile.yaml` overrides
    pub template_dir: Option<PathBuf>,
    pub readiness_poll: PollPolicy,
    pub monitor_poll: PollPolicy,
    pub osd_poll: PollPolicy,
    /// Binaries required on the host when provisioning an instance
    pub instance_dependencies: Vec<String>,
    /// Binaries required on the host when deploying directly onto it
    pub host_dependencies: Vec<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            pool_driver: "dir".to_string(),
            volume_count: 3,
            volume_size: "10GB".to_string(),
            image_alias: "ubuntu/jammy".to_string(),
            image_server: "https://images.linuxcontainers.org".to_string(),
            image_protocol: "simplestreams".to_string(),
            vm_flavor: "c4-m10".to_string(),
            root_disk_size: "20GB".to_string(),
            helper_script: "test/scripts/cephadm_helper.sh".to_string(),
            local_image: "localhost:5000/canonical/ceph:latest".to_string(),
            remote_base_dir: "/home/".to_string(),
            crush_rule: "replicated_osd".to_string(),
            template_dir: None,
            readiness_poll: PollPolicy::new(Duration::from_secs(10), 20),
            monitor_poll: PollPolicy::new(Duration::from_secs(30), 10),
            osd_poll: PollPolicy::new(Duration::from_secs(60), 10),
            instance_dependencies: vec!["lxc".to_string()],
            host_dependencies: vec!["bash".to_string(), "sudo".to_string()],
        }
    }
}

impl DeployConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default config file is used
    /// when present, and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = paths::config_path();
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CephlabError::IoError { path: path.to_path_buf(), source: e })?;
        serde_json::from_str(&content).map_err(|e| CephlabError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    /// Reject settings no deployment could succeed with.
    pub fn validate(&self) -> Result<()> {
        let polls = [
            ("readiness_poll", &self.readiness_poll),
            ("monitor_poll", &self.monitor_poll),
            ("osd_poll", &self.osd_poll),
        ];
        for (name, policy) in polls {
            if policy.max_attempts == 0 {
                return Err(CephlabError::InvalidConfig {
                    reason: format!("{}.max_attempts must be at least 1", name),
                });
            }
        }
        if self.helper_script.trim().is_empty() {
            return Err(CephlabError::InvalidConfig {
                reason: "helper_script must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
