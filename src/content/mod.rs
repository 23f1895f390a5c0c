//! Post model and the parser seam.
//!
//! A source file becomes two values: the full [`Document`] that the render
//! stage turns into a page, and the [`Metadata`] projection that feeds the
//! index, the tag pages and the sitemap. The pipeline moves them on separate
//! streams, so neither type refers to the other.

mod markdown;

pub use markdown::MarkdownParser;

use crate::config::SiteConfig;
use serde::Serialize;
use thiserror::Error;

/// Fully parsed, render-ready post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    /// Output name, also the last URL segment.
    pub slug: String,
    /// Rendered HTML fragment of the markdown body.
    pub body: String,
    /// Raw date string as written in the front matter.
    pub date: String,
    pub summary: String,
    pub author: String,
    pub tags: Vec<String>,
    /// Table of contents HTML fragment, empty without headings.
    pub toc: String,
    /// Absolute social-card URL, absent when card generation is disabled.
    pub image_url: Option<String>,
}

/// The part of a post that listings need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub summary: String,
    pub author: String,
    pub tags: Vec<String>,
}

impl Document {
    /// Project the listing fields.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            slug: self.slug.clone(),
            title: self.title.clone(),
            date: self.date.clone(),
            summary: self.summary.clone(),
            author: self.author.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl Metadata {
    /// Site-relative URL of the post page.
    pub fn url_path(&self) -> String {
        post_url_path(&self.slug)
    }
}

/// `/post/<slug>`, served from `post/<slug>.html`.
pub fn post_url_path(slug: &str) -> String {
    format!("/post/{slug}")
}

/// Why a single source file could not be turned into a post.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file name `{0}` has no usable stem")]
    InvalidName(String),

    #[error("post is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("front matter opened with `+++` is never closed")]
    UnterminatedFrontMatter,

    #[error("invalid front matter")]
    FrontMatter(#[from] toml::de::Error),
}

/// Turns the raw bytes of one source file into its two projections.
///
/// Implementations are called concurrently from the parse pool.
pub trait PostParser: Sync {
    fn parse(
        &self,
        file_name: &str,
        raw: &[u8],
        config: &SiteConfig,
    ) -> Result<(Document, Metadata), ParseError>;
}
