//! Site building orchestration.
//!
//! One call to [`build_site`] is one [`BuildRun`]: a fresh sitemap, fresh
//! barriers and a fresh report. Nothing carries over between runs.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── scan_posts()                      (calling thread, fatal on error)
//!     │
//!     ├── thread::scope ───────────────────────────────────────────────────
//!     │       ├── scaffold_output()  ──► scaffolded gate
//!     │       ├── Templates::load()  ──► templates gate
//!     │       ├── dispatch()         ──► docs stream + metadata stream
//!     │       ├── build_index()      ──► index.html ──► build_tag_pages()
//!     │       ├── render_posts()     ──► rendered stream
//!     │       └── write_posts()      ──► post/*.html + images/*.png
//!     │
//!     │   static pages barrier (index + tags)
//!     │
//!     ├── sitemap.xml
//!     └── static passthrough
//! ```

use crate::{
    config::SiteConfig,
    content::PostParser,
    generator::{ImageGenerator, Sitemap},
    log,
    pipeline::{
        DispatchReport, Skipped, build_index, dispatch, render_posts, scaffold_output, scan_posts,
        signal::{FirstError, Gate, WaitGroup},
        write_posts,
    },
    templates::Templates,
    utils::fs::copy_dir_recursively,
};
use anyhow::{Context, Result};
use std::{
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::sync_channel,
    },
    thread::{self, ScopedJoinHandle},
    time::{Duration, Instant},
};

/// Outcome of a successful build.
#[derive(Debug)]
pub struct BuildReport {
    pub parsed: usize,
    pub skipped: Vec<Skipped>,
    pub tags: usize,
    pub sitemap_entries: usize,
    pub elapsed: Duration,
}

/// State shared by the stages of a single build.
pub struct BuildRun<'a> {
    pub config: &'a SiteConfig,
    pub images: &'a dyn ImageGenerator,
    pub sitemap: Sitemap,
    /// Opened once the page templates are parsed.
    pub templates: Gate<Templates>,
    /// Opened once the output directory is ready for writes.
    pub scaffolded: Gate<()>,
    /// Counted down by the index stage and the tag stage.
    pub static_pages: WaitGroup,
    pub errors: FirstError,
    tags: AtomicUsize,
}

/// Build the entire site once.
pub fn build_site(
    config: &SiteConfig,
    parser: &dyn PostParser,
    images: &dyn ImageGenerator,
) -> Result<BuildReport> {
    BuildRun::new(config, images).execute(parser)
}

impl<'a> BuildRun<'a> {
    pub fn new(config: &'a SiteConfig, images: &'a dyn ImageGenerator) -> Self {
        Self {
            config,
            images,
            sitemap: Sitemap::new(config.base_url()),
            templates: Gate::new(),
            scaffolded: Gate::new(),
            static_pages: WaitGroup::new(2),
            errors: FirstError::default(),
            tags: AtomicUsize::new(0),
        }
    }

    pub fn record_tags(&self, count: usize) {
        self.tags.store(count, Ordering::Relaxed);
    }

    fn execute(self, parser: &dyn PostParser) -> Result<BuildReport> {
        let start = Instant::now();
        let config = self.config;
        let output = &config.build.output;

        let files = scan_posts(&config.posts_dir())?;

        let depth = config.build.queue_depth.max(1);
        let (docs_tx, docs_rx) = sync_channel(depth);
        let (metas_tx, metas_rx) = sync_channel(depth);
        let (rendered_tx, rendered_rx) = sync_channel(depth);

        let run = &self;
        let dispatched = thread::scope(|s| {
            s.spawn(|| {
                run.settle(
                    &run.scaffolded,
                    scaffold_output(output, &config.assets_dir()),
                );
            });
            s.spawn(|| {
                run.settle(&run.templates, Templates::load(&config.templates_dir()));
            });
            let dispatcher = s.spawn(move || {
                run.check(dispatch(
                    files,
                    config.build.max_concurrent_parses,
                    parser,
                    config,
                    docs_tx,
                    metas_tx,
                ))
            });
            s.spawn(move || run.check(build_index(s, run, metas_rx)));
            s.spawn(move || run.check(render_posts(run, docs_rx, rendered_tx)));

            run.check(write_posts(run, rendered_rx));

            let dispatched = join(dispatcher);
            run.static_pages.wait();
            dispatched
        });

        if let Some(err) = self.errors.take() {
            return Err(err);
        }
        let DispatchReport { parsed, skipped } = dispatched.unwrap_or_default();

        let sitemap_entries = self.sitemap.write(&output.join("sitemap.xml"))?;

        if let Some(dir) = config.static_dir() {
            let copied = copy_dir_recursively(&dir, output)
                .with_context(|| format!("Failed to copy static files from {}", dir.display()))?;
            log!("static"; "{} files", copied);
        }

        let report = BuildReport {
            parsed,
            skipped,
            tags: self.tags.load(Ordering::Relaxed),
            sitemap_entries,
            elapsed: start.elapsed(),
        };
        log!(
            "build";
            "{} posts, {} tags, {} skipped in {:.2?}",
            report.parsed,
            report.tags,
            report.skipped.len(),
            report.elapsed
        );

        Ok(report)
    }

    /// Open `gate` on success. On failure record the error first, then abort
    /// the gate, so the root cause is the error the build reports.
    fn settle<T>(&self, gate: &Gate<T>, result: Result<T>) {
        match result {
            Ok(value) => gate.open(value),
            Err(err) => {
                self.errors.record(err);
                gate.abort();
            }
        }
    }

    fn check<T>(&self, result: Result<T>) -> Option<T> {
        result.map_err(|err| self.errors.record(err)).ok()
    }
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OgImageConfig,
        content::MarkdownParser,
        templates::{INDEX_TEMPLATE, POST_TEMPLATE, TAG_TEMPLATE},
    };
    use anyhow::bail;
    use parking_lot::Mutex;
    use std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    };
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// Writes the title as the image body.
    #[derive(Default)]
    struct StubImages {
        titles: Mutex<Vec<String>>,
    }

    impl ImageGenerator for StubImages {
        fn generate(&self, title: &str, out_path: &Path, _: &OgImageConfig) -> Result<()> {
            self.titles.lock().push(title.to_owned());
            fs::write(out_path, title)?;
            Ok(())
        }
    }

    struct FailingImages;

    impl ImageGenerator for FailingImages {
        fn generate(&self, _: &str, _: &Path, _: &OgImageConfig) -> Result<()> {
            bail!("font exploded")
        }
    }

    struct Site {
        dir: TempDir,
        config: SiteConfig,
    }

    impl Site {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            fs::create_dir_all(root.join("posts")).unwrap();
            fs::create_dir_all(root.join("templates")).unwrap();
            fs::write(
                root.join("templates").join(POST_TEMPLATE),
                "<h1>{{ title }}</h1>{{ body | safe }}",
            )
            .unwrap();
            fs::write(
                root.join("templates").join(INDEX_TEMPLATE),
                "{% for p in posts %}{{ p.slug }}\n{% endfor %}",
            )
            .unwrap();
            fs::write(
                root.join("templates").join(TAG_TEMPLATE),
                "{{ tag }}:{% for p in posts %}{{ p.slug }},{% endfor %}",
            )
            .unwrap();

            let mut config = SiteConfig::default();
            config.base.url = Some("https://example.com/".into());
            config.build.input = root.to_path_buf();
            config.build.output = root.join("out");
            config.build.max_concurrent_parses = 2;
            config.build.queue_depth = 1;

            Self { dir, config }
        }

        fn post(&self, slug: &str, date: &str, tags: &[&str]) -> &Self {
            let tags = tags
                .iter()
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let src = format!(
                "+++\ntitle = \"Title {slug}\"\ndate = \"{date}\"\ntags = [{tags}]\n+++\n\nBody of {slug}.\n"
            );
            self.raw(&format!("{slug}.md"), &src)
        }

        fn raw(&self, name: &str, src: &str) -> &Self {
            fs::write(self.dir.path().join("posts").join(name), src).unwrap();
            self
        }

        fn out(&self) -> PathBuf {
            self.config.build.output.clone()
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.out().join(rel)).unwrap()
        }

        fn build(&self) -> Result<BuildReport> {
            build_site(&self.config, &MarkdownParser, &StubImages::default())
        }

        fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
            WalkDir::new(self.out())
                .into_iter()
                .map(Result::unwrap)
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    let rel = e.path().strip_prefix(self.out()).unwrap().to_path_buf();
                    (rel, fs::read(e.path()).unwrap())
                })
                .collect()
        }
    }

    /// Every entry under the site root outside the output directory.
    fn source_snapshot(site: &Site) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        let root = site.dir.path();
        let out = site.out();
        WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.path() != out)
            .map(Result::unwrap)
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                let content = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, content)
            })
            .collect()
    }

    fn sitemap_locs(xml: &str) -> Vec<String> {
        xml.lines()
            .filter_map(|line| {
                let line = line.trim();
                line.strip_prefix("<loc>")?
                    .strip_suffix("</loc>")
                    .map(str::to_owned)
            })
            .collect()
    }

    #[test]
    fn test_build_writes_every_page() {
        let site = Site::new();
        site.post("jan", "01/01/2024", &["go"])
            .post("mar", "03/01/2024", &["go", "infra"])
            .post("feb", "02/01/2024", &[]);

        let report = site.build().unwrap();

        assert_eq!(report.parsed, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(report.tags, 2);
        for slug in ["jan", "feb", "mar"] {
            let page = site.read(&format!("post/{slug}.html"));
            assert!(page.starts_with(&format!("<h1>Title {slug}</h1>")));
            assert!(page.contains(&format!("Body of {slug}.")));
        }
        assert_eq!(site.read("index.html"), "mar\nfeb\njan\n");
        assert_eq!(site.read("tags/go.html"), "go:mar,jan,");
        assert_eq!(site.read("tags/infra.html"), "infra:mar,");
    }

    #[test]
    fn test_build_sitemap_has_every_page_once() {
        let site = Site::new();
        site.post("a", "01/01/2024", &["go", "Rust Async"])
            .post("b", "01/02/2024", &["go"])
            .post("c", "01/03/2024", &[]);

        let report = site.build().unwrap();
        let locs = sitemap_locs(&site.read("sitemap.xml"));

        // 3 posts + 2 tags + index
        assert_eq!(report.sitemap_entries, 6);
        assert_eq!(locs.len(), 6);
        let mut unique = locs.clone();
        unique.dedup();
        assert_eq!(unique, locs);

        assert!(locs.contains(&"https://example.com/".to_string()));
        assert!(locs.contains(&"https://example.com/post/a".to_string()));
        assert!(locs.contains(&"https://example.com/tags/rust-async".to_string()));
        assert!(site.out().join("tags/rust-async.html").exists());
    }

    #[test]
    fn test_build_keeps_malformed_dates() {
        let site = Site::new();
        site.post("dated", "05/05/2024", &[])
            .post("zulu", "soon", &[])
            .post("alpha", "TBD", &[]);

        let report = site.build().unwrap();

        assert_eq!(report.parsed, 3);
        assert_eq!(site.read("index.html"), "dated\nalpha\nzulu\n");
    }

    #[test]
    fn test_build_skips_broken_source() {
        let site = Site::new();
        site.post("good", "01/01/2024", &["go"])
            .raw("broken.md", "+++\ntitle = \"no end\"\n");

        let report = site.build().unwrap();

        assert_eq!(report.parsed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].file.ends_with("broken.md"));
        assert_eq!(site.read("index.html"), "good\n");
        assert!(!site.out().join("post/broken.html").exists());
        assert!(!site.read("sitemap.xml").contains("broken"));
    }

    #[test]
    fn test_build_is_idempotent() {
        let site = Site::new();
        for i in 0..8 {
            site.post(&format!("p{i}"), &format!("01/0{}/2024", i + 1), &["go", "rust"]);
        }

        site.build().unwrap();
        let first = site.snapshot();
        site.build().unwrap();
        let second = site.snapshot();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_scaffold_preserves_subdirectories() {
        let site = Site::new();
        site.post("a", "01/01/2024", &[]);
        let out = site.out();
        fs::create_dir_all(out.join("custom")).unwrap();
        fs::write(out.join("custom/keep.txt"), "mine").unwrap();
        fs::write(out.join("stale.html"), "old").unwrap();

        site.build().unwrap();

        assert_eq!(site.read("custom/keep.txt"), "mine");
        assert!(!out.join("stale.html").exists());
        for dir in ["images", "assets", "post", "tags"] {
            assert!(out.join(dir).is_dir());
        }
    }

    #[test]
    fn test_build_generates_images_when_enabled() {
        let mut site = Site::new();
        site.config.build.og_image = Some(OgImageConfig::default());
        site.post("a", "01/01/2024", &[]).post("b", "01/02/2024", &[]);

        let images = StubImages::default();
        build_site(&site.config, &MarkdownParser, &images).unwrap();

        let mut titles = images.titles.lock().clone();
        titles.sort();
        assert_eq!(titles, ["Title a", "Title b"]);
        assert_eq!(site.read("images/a.png"), "Title a");
    }

    #[test]
    fn test_build_without_images() {
        let site = Site::new();
        site.post("a", "01/01/2024", &[]);

        let images = StubImages::default();
        build_site(&site.config, &MarkdownParser, &images).unwrap();

        assert!(images.titles.lock().is_empty());
        assert!(!site.out().join("images/a.png").exists());
    }

    #[test]
    fn test_build_image_failure_is_fatal() {
        let mut site = Site::new();
        site.config.build.og_image = Some(OgImageConfig::default());
        site.post("a", "01/01/2024", &[]);

        let err = build_site(&site.config, &MarkdownParser, &FailingImages).unwrap_err();
        assert!(format!("{err:#}").contains("font exploded"));
    }

    #[test]
    fn test_build_missing_template_is_fatal() {
        let site = Site::new();
        for i in 0..5 {
            site.post(&format!("p{i}"), "01/01/2024", &["go"]);
        }
        fs::remove_file(site.dir.path().join("templates").join(TAG_TEMPLATE)).unwrap();

        let err = site.build().unwrap_err();
        assert!(format!("{err:#}").contains(TAG_TEMPLATE));
    }

    #[test]
    fn test_build_missing_posts_dir_is_fatal() {
        let site = Site::new();
        fs::remove_dir(site.dir.path().join("posts")).unwrap();

        assert!(site.build().is_err());
    }

    #[test]
    fn test_build_copies_assets_and_static_files() {
        let mut site = Site::new();
        site.post("a", "01/01/2024", &[]);
        let root = site.dir.path().to_path_buf();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/style.css"), "body{}").unwrap();
        fs::create_dir_all(root.join("static/.well-known")).unwrap();
        fs::write(root.join("static/robots.txt"), "User-agent: *").unwrap();
        fs::write(root.join("static/.well-known/security.txt"), "x").unwrap();
        site.config.build.static_files.path = Some(PathBuf::from("static"));

        site.build().unwrap();

        assert_eq!(site.read("assets/style.css"), "body{}");
        assert_eq!(site.read("robots.txt"), "User-agent: *");
        assert_eq!(site.read(".well-known/security.txt"), "x");
    }

    #[test]
    fn test_build_writes_only_under_output() {
        let mut site = Site::new();
        site.config.build.og_image = Some(OgImageConfig::default());
        site.post("a", "01/01/2024", &["go", "Rust Async"])
            .post("b", "bad date", &["go"])
            .raw("broken.md", "+++\ntitle = \"open\"\n");
        let root = site.dir.path().to_path_buf();
        fs::create_dir_all(root.join("assets/img")).unwrap();
        fs::write(root.join("assets/img/logo.png"), "png").unwrap();
        fs::create_dir_all(root.join("static")).unwrap();
        fs::write(root.join("static/robots.txt"), "User-agent: *").unwrap();
        site.config.build.static_files.path = Some(PathBuf::from("static"));

        let before = source_snapshot(&site);
        site.build().unwrap();
        site.build().unwrap();
        let after = source_snapshot(&site);

        assert_eq!(before, after);
        assert!(site.out().join("robots.txt").is_file());
        assert!(site.out().join("images/a.png").is_file());
    }

    #[test]
    fn test_build_missing_static_dir_is_fatal() {
        let mut site = Site::new();
        site.post("a", "01/01/2024", &[]);
        site.config.build.static_files.path = Some(PathBuf::from("nope"));

        let err = site.build().unwrap_err();
        assert!(format!("{err:#}").contains("static"));
    }

    #[test]
    fn test_build_empty_site() {
        let site = Site::new();

        let report = site.build().unwrap();

        assert_eq!(report.parsed, 0);
        assert_eq!(report.sitemap_entries, 1);
        assert_eq!(site.read("index.html"), "");
    }
}
