//! Teardown of the resources recorded in a persisted resource model.
//!
//! Deletion runs in dependency order: instance, profile, volumes, pool. Each
//! resource is looked up again right before it is deleted, so a model describing
//! resources that were already removed by hand is cleaned without errors.

use crate::backend::VirtualizationBackend;
use crate::error::Result;
use crate::types::model::{InstanceRecord, ResourceModel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Summary of a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Resources deleted.
    pub deleted: usize,
    /// Recorded resources that no longer existed, or could not be addressed.
    pub skipped: usize,
}

/// Deletes what a deployment run recorded. Never modifies the model file.
pub struct Cleaner {
    source: PathBuf,
    model: Option<ResourceModel>,
    backend: Arc<dyn VirtualizationBackend>,
}

impl Cleaner {
    /// Load the model at `path`. A missing file yields a cleaner with nothing to do.
    pub fn open(path: &Path, backend: Arc<dyn VirtualizationBackend>) -> Result<Self> {
        let model = if path.exists() {
            Some(ResourceModel::load(path)?)
        } else {
            info!(path = %path.display(), "Model file not found, nothing to clean");
            None
        };
        Ok(Self { source: path.to_path_buf(), model, backend })
    }

    /// Clean an in-memory model.
    pub fn from_model(model: ResourceModel, backend: Arc<dyn VirtualizationBackend>) -> Self {
        Self { source: PathBuf::new(), model: Some(model), backend }
    }

    pub fn model(&self) -> Option<&ResourceModel> {
        self.model.as_ref()
    }

    /// Delete every recorded resource that still exists.
    #[instrument(skip(self), fields(model = %self.source.display()))]
    pub async fn clean(&self) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let Some(model) = &self.model else {
            return Ok(report);
        };

        if let Some(instance) = &model.instance {
            self.remove_instance(instance, &mut report).await?;
        }

        if let Some(profile) = &model.profile {
            if self.backend.profile_exists(profile).await? {
                let handle = self.backend.get_profile(profile).await?;
                self.backend.delete_profile(&handle).await?;
                info!(profile = %profile, "Profile deleted");
                report.deleted += 1;
            } else {
                info!(profile = %profile, "Profile not found, skipping");
                report.skipped += 1;
            }
        }

        match &model.storage_pool {
            Some(pool) => {
                for volume in &model.volumes {
                    if self.backend.volume_exists(pool, volume).await? {
                        let handle = self.backend.get_volume(pool, volume).await?;
                        self.backend.delete_volume(&handle).await?;
                        info!(volume = %volume, pool = %pool, "Volume deleted");
                        report.deleted += 1;
                    } else {
                        info!(volume = %volume, pool = %pool, "Volume not found, skipping");
                        report.skipped += 1;
                    }
                }

                if self.backend.pool_exists(pool).await? {
                    let handle = self.backend.get_pool(pool).await?;
                    self.backend.delete_pool(&handle).await?;
                    info!(pool = %pool, "Storage pool deleted");
                    report.deleted += 1;
                } else {
                    info!(pool = %pool, "Storage pool not found, skipping");
                    report.skipped += 1;
                }
            }
            None if !model.volumes.is_empty() => {
                warn!(
                    volumes = model.volumes.len(),
                    "Volumes recorded without a storage pool, skipping them"
                );
                report.skipped += model.volumes.len();
            }
            None => {}
        }

        info!(deleted = report.deleted, skipped = report.skipped, "Cleanup finished");
        Ok(report)
    }

    async fn remove_instance(
        &self,
        instance: &InstanceRecord,
        report: &mut CleanReport,
    ) -> Result<()> {
        if !self.backend.instance_exists(&instance.name).await? {
            info!(instance = %instance.name, "Instance not found, skipping");
            report.skipped += 1;
            return Ok(());
        }

        let handle = self.backend.get_instance(&instance.name).await?;
        if handle.is_running() {
            info!(instance = %instance.name, "Stopping instance");
            self.backend.stop_instance(&handle).await?;
        }
        self.backend.delete_instance(&handle).await?;
        info!(instance = %instance.name, kind = %instance.kind, "Instance deleted");
        report.deleted += 1;
        Ok(())
    }
}
