//! Execution inside a provisioned instance.

use super::RemoteExecutor;
use crate::backend::{InstanceTransport, VirtualizationBackend};
use crate::error::{CephlabError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Runs commands inside a named instance through the backend's exec transport.
#[derive(Clone)]
pub struct InstanceExecutor {
    backend: Arc<dyn VirtualizationBackend>,
    transport: Arc<dyn InstanceTransport>,
    instance: String,
}

impl InstanceExecutor {
    pub fn new(
        backend: Arc<dyn VirtualizationBackend>,
        transport: Arc<dyn InstanceTransport>,
        instance: impl Into<String>,
    ) -> Self {
        Self { backend, transport, instance: instance.into() }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    async fn ensure_instance(&self) -> Result<()> {
        if self.backend.instance_exists(&self.instance).await? {
            Ok(())
        } else {
            Err(CephlabError::precondition(format!("Instance {} does not exist", self.instance)))
        }
    }
}

#[async_trait]
impl RemoteExecutor for InstanceExecutor {
    #[instrument(skip(self, argv), fields(instance = %self.instance, command = %argv.join(" ")))]
    async fn run(&self, argv: &[String]) -> Result<String> {
        self.ensure_instance().await?;
        debug!("Executing on instance");
        self.transport.execute(&self.instance, argv).await?.into_stdout(argv)
    }

    #[instrument(skip(self), fields(instance = %self.instance))]
    async fn transfer(&self, source: &Path, target_dir: &Path) -> Result<PathBuf> {
        self.ensure_instance().await?;

        let name = source.file_name().ok_or_else(|| CephlabError::TransferFailed {
            source_path: source.to_path_buf(),
            target: self.describe(),
            reason: "source has no file name".to_string(),
        })?;

        // lxc treats the destination as a directory only with a trailing slash.
        let mut dir = target_dir.to_string_lossy().into_owned();
        if !dir.ends_with('/') {
            dir.push('/');
        }

        self.transport.push_recursive(&self.instance, source, &dir).await?;
        Ok(target_dir.join(name))
    }

    fn describe(&self) -> String {
        format!("instance {}", self.instance)
    }
}
