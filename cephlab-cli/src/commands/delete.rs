//! Delete command: tear down what a deployment recorded.

use anyhow::{Context, Result};
use cephlab_core::{Cleaner, LxdBackend};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// Deletes the resources listed in `model_file`.
pub async fn delete(model_file: &Path) -> Result<()> {
    let backend = Arc::new(LxdBackend::new()?);
    let cleaner = Cleaner::open(model_file, backend)
        .with_context(|| format!("Failed to read model file {}", model_file.display()))?;

    if cleaner.model().is_none() {
        println!("{} {} not found, nothing to delete", "!".yellow().bold(), model_file.display());
        return Ok(());
    }

    let report = cleaner.clean().await?;

    println!(
        "{} Deleted {} resource(s), {} already gone",
        "✓".green().bold(),
        report.deleted.to_string().green(),
        report.skipped.to_string().yellow()
    );
    Ok(())
}
