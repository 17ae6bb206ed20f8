//! `cephadm shell` wrapper around any executor.

use super::RemoteExecutor;
use crate::error::Result;
use std::sync::Arc;

/// Runs commands inside the cluster-management tool's container context.
#[derive(Clone)]
pub struct ClusterShell {
    executor: Arc<dyn RemoteExecutor>,
    prefix: Vec<String>,
}

impl ClusterShell {
    /// Shell inside an instance, where commands already run as root.
    pub fn on_instance(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self::with_prefix(executor, &["cephadm", "shell", "--"])
    }

    /// Shell on the local host, elevated through sudo.
    pub fn on_host(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self::with_prefix(executor, &["sudo", "cephadm", "shell", "--"])
    }

    fn with_prefix(executor: Arc<dyn RemoteExecutor>, prefix: &[&str]) -> Self {
        Self { executor, prefix: prefix.iter().map(|s| s.to_string()).collect() }
    }

    /// Full argv as sent to the underlying executor.
    pub fn wrap(&self, argv: &[String]) -> Vec<String> {
        self.prefix.iter().chain(argv).cloned().collect()
    }

    pub async fn run(&self, argv: &[String]) -> Result<String> {
        self.executor.run(&self.wrap(argv)).await
    }
}
