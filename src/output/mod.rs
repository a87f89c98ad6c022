//! Saving recognized text
//!
//! Writes recognized text to a timestamped file, `txt` or `md`.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

/// Build a timestamped output file name, e.g. `kopista_20260829153000.txt`.
pub fn generate_filename(extension: &str) -> String {
    format!(
        "kopista_{}.{}",
        Local::now().format("%Y%m%d%H%M%S"),
        extension
    )
}

/// Save recognized text under `dir`, returning the written path.
pub fn save_text(content: &str, dir: &Path, extension: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;

    let path = dir.join(generate_filename(extension));
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write output file: {}", path.display()))?;

    Ok(path)
}
