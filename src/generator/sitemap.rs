//! Sitemap accumulation.
//!
//! Pages register their site-relative path while the build runs; the sitemap
//! is serialized once, after every page is known to exist.
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">
//!   <url>
//!     <loc>https://example.com/</loc>
//!   </url>
//! </urlset>
//! ```

use crate::log;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::{fs, io::Cursor, path::Path};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// XHTML namespace, for alternate-language links
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SitemapError {
    #[error("sitemap already serialized, cannot add `{0}`")]
    Sealed(String),
}

// ============================================================================
// Sitemap Implementation
// ============================================================================

/// Append-only URL collector shared by every page-producing stage of a build.
pub struct Sitemap {
    base_url: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    urls: Vec<String>,
    sealed: bool,
}

impl Sitemap {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            state: Mutex::default(),
        }
    }

    /// Register a site-relative path such as `/post/hello`.
    pub fn add_page(&self, path: &str) -> Result<(), SitemapError> {
        let mut state = self.state.lock();
        if state.sealed {
            return Err(SitemapError::Sealed(path.to_owned()));
        }
        state.urls.push(format!("{}{path}", self.base_url));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// Seal the sitemap and serialize it. Entries are sorted by URL.
    pub fn finish(&self) -> Result<String> {
        let urls = {
            let mut state = self.state.lock();
            state.sealed = true;
            let mut urls = state.urls.clone();
            urls.sort_unstable();
            urls
        };

        into_xml(&urls)
    }

    /// Seal, serialize and write to `path`.
    pub fn write(&self, path: &Path) -> Result<usize> {
        let xml = self.finish()?;
        fs::write(path, xml)
            .with_context(|| format!("Failed to write sitemap to {}", path.display()))?;

        let count = self.len();
        log!("sitemap"; "{} urls", count);
        Ok(count)
    }
}

/// Generate sitemap XML string.
fn into_xml(urls: &[String]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::with_capacity(4096)), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("urlset").with_attributes([("xmlns", SITEMAP_NS), ("xmlns:xhtml", XHTML_NS)]),
    ))?;

    for url in urls {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        writer.write_event(Event::Start(BytesStart::new("loc")))?;
        writer.write_event(Event::Text(BytesText::new(url)))?;
        writer.write_event(Event::End(BytesEnd::new("loc")))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
    xml.push('\n');
    Ok(xml)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sitemap_empty() {
        let xml = Sitemap::new("https://example.com").finish().unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"xmlns="{SITEMAP_NS}""#)));
        assert!(xml.contains(&format!(r#"xmlns:xhtml="{XHTML_NS}""#)));
        assert!(xml.contains("</urlset>"));
        assert!(!xml.contains("<url>"));
    }

    #[test]
    fn test_sitemap_joins_base_url() {
        let sitemap = Sitemap::new("https://example.com/");
        sitemap.add_page("/").unwrap();
        sitemap.add_page("/post/hello").unwrap();
        let xml = sitemap.finish().unwrap();

        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/post/hello</loc>"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[test]
    fn test_sitemap_xml_structure() {
        let sitemap = Sitemap::new("https://example.com");
        sitemap.add_page("/").unwrap();
        let xml = sitemap.finish().unwrap();

        let lines: Vec<&str> = xml.lines().collect();
        assert_eq!(lines[0], r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        assert!(lines[1].starts_with("<urlset"));
        assert_eq!(lines[2], "  <url>");
        assert_eq!(lines[3], "    <loc>https://example.com/</loc>");
        assert_eq!(lines[4], "  </url>");
        assert_eq!(lines.last().unwrap().trim(), "</urlset>");
    }

    #[test]
    fn test_sitemap_escapes_special_chars() {
        let sitemap = Sitemap::new("https://example.com");
        sitemap.add_page("/tags/r&d").unwrap();
        let xml = sitemap.finish().unwrap();

        assert!(xml.contains("<loc>https://example.com/tags/r&amp;d</loc>"));
    }

    #[test]
    fn test_sitemap_sorted_output() {
        let sitemap = Sitemap::new("https://example.com");
        sitemap.add_page("/tags/go").unwrap();
        sitemap.add_page("/").unwrap();
        sitemap.add_page("/post/a").unwrap();
        let xml = sitemap.finish().unwrap();

        let root = xml.find("https://example.com/<").unwrap();
        let post = xml.find("/post/a").unwrap();
        let tag = xml.find("/tags/go").unwrap();
        assert!(root < post && post < tag);
    }

    #[test]
    fn test_sitemap_concurrent_appends() {
        let sitemap = Sitemap::new("https://example.com");

        thread::scope(|s| {
            for worker in 0..8 {
                let sitemap = &sitemap;
                s.spawn(move || {
                    for i in 0..50 {
                        sitemap.add_page(&format!("/post/{worker}-{i}")).unwrap();
                    }
                });
            }
        });

        assert_eq!(sitemap.len(), 400);
        let xml = sitemap.finish().unwrap();
        assert_eq!(xml.matches("<url>").count(), 400);
    }

    #[test]
    fn test_sitemap_sealed_after_finish() {
        let sitemap = Sitemap::new("https://example.com");
        sitemap.add_page("/").unwrap();
        sitemap.finish().unwrap();

        assert_eq!(
            sitemap.add_page("/late"),
            Err(SitemapError::Sealed("/late".into()))
        );
        assert_eq!(sitemap.len(), 1);
    }

    #[test]
    fn test_sitemap_write() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sitemap.xml");
        let sitemap = Sitemap::new("https://example.com");
        sitemap.add_page("/").unwrap();

        assert_eq!(sitemap.write(&path).unwrap(), 1);
        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<loc>https://example.com/</loc>"));
    }
}
