//! Output directory preparation.

use crate::utils::fs::{copy_dir_recursively, remove_top_level_files};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Subdirectories every build writes into.
pub const SCAFFOLD_DIRS: &[&str] = &["images", "assets", "post", "tags"];

/// Prepare `output` for a build.
///
/// Stale top-level files are removed, existing subdirectories are kept, the
/// scaffold directories are created and `assets_src` (if present) is copied
/// into `output/assets`.
pub fn scaffold_output(output: &Path, assets_src: &Path) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;
    remove_top_level_files(output)?;

    for dir in SCAFFOLD_DIRS {
        let path = output.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }

    if assets_src.is_dir() {
        copy_dir_recursively(assets_src, &output.join("assets"))?;
    }

    Ok(())
}
