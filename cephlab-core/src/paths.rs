//! Centralized path resolution for cephlab.

use std::path::{Path, PathBuf};

/// Get the cephlab configuration directory.
///
/// Resolution order:
/// 1. `CEPHLAB_CONFIG_DIR` environment variable
/// 2. `$XDG_CONFIG_HOME/cephlab` (or the platform equivalent)
/// 3. `~/.cephlab`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CEPHLAB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dir) = dirs::config_dir() {
        return dir.join("cephlab");
    }

    dirs::home_dir().map(|h| h.join(".cephlab")).unwrap_or_else(|| PathBuf::from(".cephlab"))
}

/// Get the default configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Model file of a run, placed in `dir`.
pub fn model_file_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("model-{}.json", run_id))
}

/// Recover the run id from a path produced by [`model_file_path`].
pub fn run_id_from_model_file(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("model-").filter(|id| !id.is_empty()).map(str::to_string)
}

/// Find an executable on `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
