//! Immutable per-invocation run context.
//!
//! The run id is generated exactly once per context and every derived name (deploy
//! tag, model file) comes from it, so two concurrent runs never share a model file.

use crate::error::{CephlabError, Result};
use crate::paths;
use crate::types::model::ResourceModel;
use rand::Rng;
use std::path::{Path, PathBuf};

/// Prefix of every resource name created by cephlab.
pub const DEPLOY_TAG_PREFIX: &str = "ubuntu-ceph-";

const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random suffix of uppercase letters and digits.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char).collect()
}

/// Identity and locations of one deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_id: String,
    deploy_tag: String,
    model_file: PathBuf,
    source_root: PathBuf,
}

impl RunContext {
    /// Start a fresh run whose model file lands in `model_dir`.
    pub fn new(source_root: impl Into<PathBuf>, model_dir: &Path) -> Self {
        Self::with_run_id(random_suffix(4), source_root, model_dir)
    }

    /// Build a context with a fixed run id.
    pub fn with_run_id(
        run_id: impl Into<String>,
        source_root: impl Into<PathBuf>,
        model_dir: &Path,
    ) -> Self {
        let run_id = run_id.into();
        Self {
            deploy_tag: format!("{}{}", DEPLOY_TAG_PREFIX, run_id),
            model_file: paths::model_file_path(model_dir, &run_id),
            source_root: source_root.into(),
            run_id,
        }
    }

    /// Continue a previous run from its model file.
    ///
    /// Returns the context (same run id, same model file) and the recorded model.
    pub fn resume(
        model_file: &Path,
        source_root: impl Into<PathBuf>,
    ) -> Result<(Self, ResourceModel)> {
        let run_id = paths::run_id_from_model_file(model_file).ok_or_else(|| {
            CephlabError::precondition(format!(
                "{} is not a cephlab model file (expected model-<id>.json)",
                model_file.display()
            ))
        })?;
        let model = ResourceModel::load(model_file)?;
        let dir = model_file.parent().unwrap_or_else(|| Path::new("."));
        Ok((Self::with_run_id(run_id, source_root, dir), model))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Tag naming the pool and profile; instance names extend it.
    pub fn deploy_tag(&self) -> &str {
        &self.deploy_tag
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }

    /// Local repository tree synced to the target.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Fresh instance name: `<deploy tag>-<suffix>`.
    pub fn new_instance_name(&self) -> String {
        format!("{}-{}", self.deploy_tag, random_suffix(4))
    }

    /// Fresh volume name: `vol-<suffix>`.
    pub fn new_volume_name(&self) -> String {
        format!("vol-{}", random_suffix(4))
    }
}
