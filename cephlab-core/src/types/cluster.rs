//! Cluster-side types parsed from `ceph` and `cephadm` JSON output.

use crate::error::{CephlabError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Subset of `ceph status -f json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub osdmap: OsdMap,

    #[serde(default)]
    pub monmap: MonMap,

    #[serde(default)]
    pub mgrmap: MgrMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OsdMap {
    #[serde(default)]
    pub num_osds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MonMap {
    #[serde(default)]
    pub num_mons: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MgrMap {
    #[serde(default)]
    pub available: bool,
}

impl ClusterStatus {
    /// Parse `ceph status -f json` output.
    pub fn parse(output: &str) -> Result<Self> {
        parse_json(output, "ceph status")
    }

    /// A manager is available and at least one monitor is in the monmap.
    pub fn control_plane_ready(&self) -> bool {
        self.mgrmap.available && self.monmap.num_mons > 0
    }

    pub fn osd_count(&self) -> u32 {
        self.osdmap.num_osds
    }
}

/// Entry of `cephadm ls`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CephadmDaemon {
    #[serde(default)]
    pub fsid: String,

    #[serde(default)]
    pub name: String,
}

/// Parse `cephadm ls` output.
pub fn parse_cephadm_ls(output: &str) -> Result<Vec<CephadmDaemon>> {
    parse_json(output, "cephadm ls")
}

/// Entry of `ceph osd crush rule dump -f json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrushRule {
    pub rule_name: String,
}

/// Parse `ceph osd crush rule dump -f json` output.
pub fn parse_crush_rules(output: &str) -> Result<Vec<CrushRule>> {
    parse_json(output, "ceph osd crush rule dump")
}

/// Parse `ceph osd pool ls -f json` output.
pub fn parse_pool_names(output: &str) -> Result<Vec<String>> {
    parse_json(output, "ceph osd pool ls")
}

fn parse_json<T: DeserializeOwned>(output: &str, source: &str) -> Result<T> {
    serde_json::from_str(output.trim()).map_err(|e| CephlabError::InvalidStatus {
        reason: format!("{} returned unparsable output: {}", source, e),
    })
}
