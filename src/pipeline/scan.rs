//! Source discovery.

use crate::log;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const POST_EXTENSION: &str = ".md";

/// A markdown file in the posts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// File name including the extension, e.g. `hello-world.md`.
    pub name: String,
}

/// List the `.md` files directly inside `posts_dir`, sorted by file name.
///
/// Subdirectories are not descended into. Failing to list the directory is
/// fatal.
pub fn scan_posts(posts_dir: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(posts_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Failed to list posts in {}", posts_dir.display()))?;
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(POST_EXTENSION) || !entry.path().is_file() {
            continue;
        }

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            name: name.to_owned(),
        });
    }

    log!("scan"; "{} posts in {}", files.len(), posts_dir.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_posts_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("b.md"), "").unwrap();
        fs::write(dir.join("a.md"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        fs::create_dir(dir.join("drafts.md")).unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/c.md"), "").unwrap();

        let files = scan_posts(dir).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, ["a.md", "b.md"]);
        assert_eq!(files[0].path, dir.join("a.md"));
    }

    #[test]
    fn test_scan_posts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan_posts(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_posts_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = scan_posts(&tmp.path().join("posts")).unwrap_err();
        assert!(err.to_string().contains("Failed to list posts"));
    }
}
