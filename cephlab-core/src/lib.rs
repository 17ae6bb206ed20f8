//! cephlab core library
//!
//! Provisioning, cluster convergence and teardown for single-node cephadm test
//! clusters on LXD instances or directly on the host.

pub mod backend;
pub mod cleaner;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod observability;
pub mod orchestrator;
pub mod paths;
pub mod poll;
pub mod templates;
pub mod types;

// Re-export commonly used items
pub use backend::{InstanceTransport, LxdBackend, VirtualizationBackend};
pub use cleaner::{CleanReport, Cleaner};
pub use config::DeployConfig;
pub use context::RunContext;
pub use error::{CephlabError, Result};
pub use exec::{ClusterShell, ExecOutput, HostExecutor, InstanceExecutor, RemoteExecutor};
pub use observability::init as init_observability;
pub use orchestrator::{
    DeployMode, DeployOptions, DeployReport, ImageSource, InstanceOrchestrator, Stage,
};
pub use poll::{poll, PollPolicy};
pub use types::{InstanceKind, ResourceModel};
