//! Execution directly on the local host.

use super::{ExecOutput, RemoteExecutor};
use crate::error::{CephlabError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs commands on the machine cephlab itself runs on.
#[derive(Debug, Clone, Default)]
pub struct HostExecutor;

impl HostExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteExecutor for HostExecutor {
    #[instrument(skip(self, argv), fields(command = %argv.join(" ")))]
    async fn run(&self, argv: &[String]) -> Result<String> {
        let (program, args) = argv.split_first().ok_or_else(|| CephlabError::InvalidConfig {
            reason: "cannot run an empty command".to_string(),
        })?;

        debug!("Executing on host");
        let output = Command::new(program).args(args).output().await.map_err(|e| {
            CephlabError::ExecutionFailed {
                command: argv.join(" "),
                exit_code: -1,
                output: format!("failed to spawn: {}", e),
            }
        })?;

        ExecOutput::from(output).into_stdout(argv)
    }

    /// The host already holds every host path, so nothing is copied.
    async fn transfer(&self, source: &Path, _target_dir: &Path) -> Result<PathBuf> {
        if !source.exists() {
            return Err(CephlabError::TransferFailed {
                source_path: source.to_path_buf(),
                target: self.describe(),
                reason: "source does not exist".to_string(),
            });
        }
        Ok(source.to_path_buf())
    }

    fn describe(&self) -> String {
        "host".to_string()
    }
}
