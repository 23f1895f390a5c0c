//! Markdown posts with TOML front matter.
//!
//! ```text
//! +++
//! title = "Hello, world"
//! date = "03/01/2024"
//! summary = "First post"
//! author = "kv"
//! tags = ["go", "infra"]
//! +++
//!
//! ## Intro
//! ...
//! ```
//!
//! Headings get unique anchor ids and are collected into the table of
//! contents. Fenced code blocks are wrapped in `<pre class="code code-<style>">`
//! so the configured code style can be targeted from CSS.

use super::{Document, Metadata, ParseError, PostParser};
use crate::{config::SiteConfig, utils::slug::anchor_slug};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

const FRONT_MATTER_FENCE: &str = "+++";

/// Default [`PostParser`] backed by `pulldown-cmark`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownParser;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    date: String,
    summary: String,
    author: String,
    tags: Vec<String>,
}

struct TocEntry {
    level: u8,
    id: String,
    text: String,
}

impl PostParser for MarkdownParser {
    fn parse(
        &self,
        file_name: &str,
        raw: &[u8],
        config: &SiteConfig,
    ) -> Result<(Document, Metadata), ParseError> {
        let slug = file_name.strip_suffix(".md").unwrap_or(file_name);
        if slug.is_empty() {
            return Err(ParseError::InvalidName(file_name.to_owned()));
        }

        let text = std::str::from_utf8(raw)?;
        let (front, body) = split_front_matter(text)?;
        let front: FrontMatter = match front {
            Some(front) => toml::from_str(front)?,
            None => FrontMatter::default(),
        };

        let (body, toc) = render_markdown(body, &config.build.code_style);
        let image_url = config
            .og_image()
            .map(|_| format!("{}/images/{slug}.png", config.base_url()));

        let doc = Document {
            title: front.title.unwrap_or_else(|| slug.replace('-', " ")),
            slug: slug.to_owned(),
            body,
            date: front.date,
            summary: front.summary,
            author: front.author,
            tags: front.tags,
            toc: render_toc(&toc),
            image_url,
        };
        let meta = doc.metadata();

        Ok((doc, meta))
    }
}

/// Split `+++`-fenced front matter from the body.
fn split_front_matter(text: &str) -> Result<(Option<&str>, &str), ParseError> {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Ok((None, text));
    };
    if first.trim_end() != FRONT_MATTER_FENCE {
        return Ok((None, text));
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FRONT_MATTER_FENCE {
            return Ok((Some(&text[start..offset]), &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(ParseError::UnterminatedFrontMatter)
}

/// Convert markdown to HTML, returning the body and the collected headings.
fn render_markdown(body: &str, code_style: &str) -> (String, Vec<TocEntry>) {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let mut events: Vec<Event> = Parser::new_ext(body, options).collect();

    let toc = assign_heading_ids(&mut events);

    let code_style = escape_html(code_style);
    let events = events.into_iter().map(|event| match event {
        Event::Start(Tag::CodeBlock(kind)) => {
            let lang = match &kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
                CodeBlockKind::Indented => "",
            };
            let open = if lang.is_empty() {
                format!(r#"<pre class="code code-{code_style}"><code>"#)
            } else {
                format!(
                    r#"<pre class="code code-{code_style}"><code class="language-{}">"#,
                    escape_html(lang)
                )
            };
            Event::Html(CowStr::from(open))
        }
        Event::End(TagEnd::CodeBlock) => Event::Html(CowStr::from("</code></pre>\n")),
        other => other,
    });

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, events);
    (out, toc)
}

/// Give every heading a unique anchor id and return them in document order.
fn assign_heading_ids(events: &mut [Event]) -> Vec<TocEntry> {
    let mut anchors = Anchors::default();
    let mut toc = Vec::new();

    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = heading_level(*level);

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() {
            match &events[end] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            end += 1;
        }

        let base = match anchor_slug(&text) {
            s if s.is_empty() => "section".to_owned(),
            s => s,
        };
        let anchor = anchors.claim(base);

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(anchor.clone()));
        }
        toc.push(TocEntry {
            level,
            id: anchor,
            text,
        });
        i = end + 1;
    }

    toc
}

/// Anchor ids handed out so far in one document.
#[derive(Default)]
struct Anchors {
    used: FxHashSet<String>,
    /// Next suffix to try per base id.
    next_suffix: FxHashMap<String, usize>,
}

impl Anchors {
    /// `base` if still free, otherwise the first free `base-N`.
    fn claim(&mut self, base: String) -> String {
        let anchor = if self.used.contains(&base) {
            let suffix = self.next_suffix.entry(base.clone()).or_insert(1);
            loop {
                let candidate = format!("{base}-{suffix}");
                *suffix += 1;
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            base
        };
        self.used.insert(anchor.clone());
        anchor
    }
}

const fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn render_toc(entries: &[TocEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut out = String::from("<nav class=\"toc\"><ul>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li class=\"toc-h{}\"><a href=\"#{}\">{}</a></li>\n",
            entry.level,
            escape_html(&entry.id),
            escape_html(&entry.text)
        ));
    }
    out.push_str("</ul></nav>\n");
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
