//! Filesystem helpers shared by the scaffolder and the static passthrough.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Copy `src` into `dst` recursively, creating directories as needed.
///
/// Existing files in `dst` are overwritten. Returns the number of files copied.
pub fn copy_dir_recursively(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let name = entry.file_name().to_str().unwrap_or_default();
        if IGNORED_FILES.contains(&name) {
            continue;
        }

        let relative = entry.path().strip_prefix(src)?;
        let dest_path = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .with_context(|| format!("Failed to create {}", dest_path.display()))?;
        } else {
            fs::copy(entry.path(), &dest_path).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    dest_path.display()
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Remove the regular files directly inside `dir`, leaving subdirectories alone.
pub fn remove_top_level_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
        removed += 1;
    }

    Ok(removed)
}
