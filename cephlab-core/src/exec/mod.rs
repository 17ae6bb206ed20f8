//! Command execution on a deployment target.
//!
//! A target is either the local host or a provisioned instance. Both expose the same
//! [`RemoteExecutor`] capability, so the pipeline never branches on where a command
//! runs:
//!
//! ```text
//! RemoteExecutor ──┬── HostExecutor      argv runs locally
//!                  └── InstanceExecutor  argv runs via InstanceTransport (lxc exec)
//!
//! ClusterShell(executor)                 argv runs inside `cephadm shell`
//! ```

mod host;
mod instance;
mod shell;

pub use host::HostExecutor;
pub use instance::InstanceExecutor;
pub use shell::ClusterShell;

use crate::error::{CephlabError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,

    /// Exit status (-1 when the process was killed by a signal)
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a nonzero exit into `ExecutionFailed`, returning stdout otherwise.
    pub fn into_stdout(self, argv: &[String]) -> Result<String> {
        if self.success() {
            return Ok(self.stdout);
        }
        let output = if self.stderr.trim().is_empty() { self.stdout } else { self.stderr };
        Err(CephlabError::ExecutionFailed {
            command: argv.join(" "),
            exit_code: self.exit_code,
            output: output.trim().to_string(),
        })
    }
}

impl From<std::process::Output> for ExecOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Runs commands on one deployment target.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `argv` and return its stdout.
    ///
    /// # Errors
    ///
    /// `ExecutionFailed` carrying the captured output on a nonzero exit.
    async fn run(&self, argv: &[String]) -> Result<String>;

    /// Make `source` (a host path) available on the target under `target_dir`.
    ///
    /// Returns the path of the transferred tree on the target.
    async fn transfer(&self, source: &Path, target_dir: &Path) -> Result<PathBuf>;

    /// Human-readable target description (for logging).
    fn describe(&self) -> String;
}

/// Build an owned argv from string slices.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
