//! Error types for cephlab.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cephlab operations.
pub type Result<T> = std::result::Result<T, CephlabError>;

/// Main error type for cephlab.
#[derive(Error, Debug)]
pub enum CephlabError {
    // Precondition errors (never retried, raised before any mutation)
    #[error("Precondition failed: {reason}")]
    PreconditionFailed { reason: String },

    // Command execution errors
    #[error("Command `{command}` exited with status {exit_code}: {output}")]
    ExecutionFailed { command: String, exit_code: i32, output: String },

    #[error("Failed to transfer {source_path:?} to {target}: {reason}")]
    TransferFailed { source_path: PathBuf, target: String, reason: String },

    // Convergence errors
    #[error("Timed out waiting for {what} after {attempts} attempts (last observed: {last_observed})")]
    ConvergenceTimeout {
        what: String,
        attempts: u32,
        last_observed: String,
        #[source]
        last_error: Option<Box<CephlabError>>,
    },

    // Virtualization backend errors
    #[error("Backend operation {operation} failed: {reason}")]
    Backend { operation: String, reason: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    // Cluster status errors
    #[error("Unexpected cluster output: {reason}")]
    InvalidStatus { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid profile template {name}: {reason}")]
    TemplateError { name: String, reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Deployment interrupted by user")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CephlabError {
    /// Create a Backend error for the named operation.
    pub fn backend(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Backend { operation: operation.into(), reason: reason.to_string() }
    }

    /// Create a PreconditionFailed error.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::PreconditionFailed { reason: reason.into() }
    }

    /// Whether a poller may treat this error as "not ready yet".
    ///
    /// Failures of the remote side (commands, transfers, backend calls, half-written
    /// status output) are transient. Anything describing a wrong request is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ExecutionFailed { .. }
                | Self::TransferFailed { .. }
                | Self::Backend { .. }
                | Self::InvalidStatus { .. }
        )
    }
}
