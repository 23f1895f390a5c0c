//! Page templates.
//!
//! Three `tera` templates are read from `<input>/templates`:
//!
//! | File         | Context                                   |
//! |--------------|-------------------------------------------|
//! | `post.html`  | every [`Document`] field (`body \| safe`) |
//! | `index.html` | `posts`: listing in canonical order       |
//! | `tag.html`   | `tag`: display name, `posts`: listing     |
//!
//! A `tag_url` filter maps a tag name to its page slug, so templates can link
//! to `/tags/{{ tag | tag_url }}`.

use crate::{
    content::{Document, Metadata},
    utils::slug::tag_slug,
};
use anyhow::{Context as _, Result};
use std::{collections::HashMap, fs, path::Path};
use tera::{Context, Error, Tera, Value};

pub const POST_TEMPLATE: &str = "post.html";
pub const INDEX_TEMPLATE: &str = "index.html";
pub const TAG_TEMPLATE: &str = "tag.html";

/// Parsed templates, shared read-only by every render task.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Read and compile the three page templates from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut tera = Tera::default();
        tera.register_filter("tag_url", tag_url);

        for name in [POST_TEMPLATE, INDEX_TEMPLATE, TAG_TEMPLATE] {
            let path = dir.join(name);
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            tera.add_raw_template(name, &source)
                .with_context(|| format!("Failed to parse template {}", path.display()))?;
        }

        Ok(Self { tera })
    }

    pub fn render_post(&self, doc: &Document) -> Result<String> {
        let context = Context::from_serialize(doc)?;
        self.render(POST_TEMPLATE, &context)
            .with_context(|| format!("Failed to render post `{}`", doc.slug))
    }

    pub fn render_index(&self, posts: &[Metadata]) -> Result<String> {
        let mut context = Context::new();
        context.insert("posts", posts);
        self.render(INDEX_TEMPLATE, &context)
            .context("Failed to render index")
    }

    pub fn render_tag(&self, tag: &str, posts: &[&Metadata]) -> Result<String> {
        let mut context = Context::new();
        context.insert("tag", tag);
        context.insert("posts", posts);
        self.render(TAG_TEMPLATE, &context)
            .with_context(|| format!("Failed to render tag `{tag}`"))
    }

    fn render(&self, name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(name, context)?)
    }
}

fn tag_url(value: &Value, _: &HashMap<String, Value>) -> Result<Value, Error> {
    match value {
        Value::String(tag) => Ok(Value::String(tag_slug(tag))),
        _ => Err(Error::msg("tag_url filter requires a string")),
    }
}
