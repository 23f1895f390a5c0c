//! Quickstart scaffolding.
//!
//! Writes a small, buildable example project into a target directory.

use crate::log;
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Embedded example project, as `(relative path, content)`.
const QUICKSTART_FILES: &[(&str, &str)] = &[
    ("easyblog.toml", include_str!("embed/quickstart/easyblog.toml")),
    ("templates/post.html", include_str!("embed/quickstart/templates/post.html")),
    ("templates/index.html", include_str!("embed/quickstart/templates/index.html")),
    ("templates/tag.html", include_str!("embed/quickstart/templates/tag.html")),
    ("posts/hello-world.md", include_str!("embed/quickstart/posts/hello-world.md")),
    ("assets/style.css", include_str!("embed/quickstart/assets/style.css")),
];

/// Scaffold the example project into `target`.
///
/// Fails before writing anything if one of the files already exists.
pub fn new_site(target: &Path) -> Result<()> {
    for (name, _) in QUICKSTART_FILES {
        let path = target.join(name);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `easyblog quickstart <DIR>` instead.",
                path.display()
            );
        }
    }

    for (name, content) in QUICKSTART_FILES {
        let path = target.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    log!("quickstart"; "created example blog in {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SiteConfig,
        content::{MarkdownParser, PostParser},
        generator::OgRenderer,
    };

    #[test]
    fn test_new_site_writes_every_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("blog");

        new_site(&target).unwrap();

        for (name, content) in QUICKSTART_FILES {
            assert_eq!(fs::read_to_string(target.join(name)).unwrap(), *content);
        }
    }

    #[test]
    fn test_new_site_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("posts")).unwrap();
        fs::write(tmp.path().join("posts/hello-world.md"), "mine").unwrap();

        let err = new_site(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("posts/hello-world.md")).unwrap(),
            "mine"
        );
        assert!(!tmp.path().join("easyblog.toml").exists());
    }

    #[test]
    fn test_embedded_config_is_valid() {
        let config = SiteConfig::from_str(QUICKSTART_FILES[0].1).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_embedded_post_parses() {
        let config = SiteConfig::default();
        let (_, source) = QUICKSTART_FILES
            .iter()
            .find(|(name, _)| name.ends_with(".md"))
            .unwrap();

        let (doc, meta) = MarkdownParser
            .parse("hello-world.md", source.as_bytes(), &config)
            .unwrap();
        assert_eq!(doc.title, "Hello, world");
        assert_eq!(doc.tags, ["meta", "Getting Started"]);
        assert_eq!(meta.slug, "hello-world");
    }

    #[test]
    fn test_quickstart_site_builds() {
        let tmp = tempfile::tempdir().unwrap();
        new_site(tmp.path()).unwrap();

        let mut config = SiteConfig::from_str(QUICKSTART_FILES[0].1).unwrap();
        config.build.input = tmp.path().to_path_buf();
        config.build.output = tmp.path().join("out");

        let report = crate::build::build_site(&config, &MarkdownParser, &OgRenderer::new()).unwrap();
        assert_eq!(report.parsed, 1);
        assert_eq!(report.tags, 2);

        let out = tmp.path().join("out");
        let post = fs::read_to_string(out.join("post/hello-world.html")).unwrap();
        assert!(post.contains("href=\"/tags/getting-started\""));
        assert!(out.join("tags/meta.html").is_file());
        assert!(out.join("assets/style.css").is_file());
        assert!(fs::read_to_string(out.join("index.html")).unwrap().contains("/post/hello-world"));
    }
}
