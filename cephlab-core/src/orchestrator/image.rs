//! Container image acquisition for the bootstrap.

use std::path::PathBuf;

/// Where the cluster image comes from. Exactly one source is used per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Pull a published image; configures an insecure registry entry when needed.
    Registry(String),

    /// Build the image on the target from the synced repository.
    Build { build_arg: Option<String> },

    /// Transfer a pre-built image archive and load it on the target.
    Archive(PathBuf),
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(reference) => write!(f, "registry image {}", reference),
            Self::Build { build_arg: Some(arg) } => write!(f, "local build ({})", arg),
            Self::Build { build_arg: None } => write!(f, "local build"),
            Self::Archive(path) => write!(f, "archive {}", path.display()),
        }
    }
}

/// Registry host needing an insecure-registry entry before `reference` can be pulled.
///
/// Only self-hosted registries addressed as `host:port/...` qualify, and loopback
/// hosts are exempt: the container runtime already trusts them.
pub fn insecure_registry_host(reference: &str) -> Option<&str> {
    let (registry, _path) = reference.split_once('/')?;
    let (host, port) = registry.rsplit_once(':')?;
    if host.is_empty() || port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match host {
        "localhost" | "127.0.0.1" | "[::1]" => None,
        _ => Some(host),
    }
}
