//! Tag pages.

use crate::{
    build::BuildRun, content::Metadata, log, templates::Templates, utils::slug::tag_slug,
};
use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs};

/// Posts sharing one tag, in listing order.
#[derive(Debug)]
pub struct TagGroup<'a> {
    /// Spelling of the tag on the first post that uses it.
    pub name: String,
    pub slug: String,
    pub posts: Vec<&'a Metadata>,
}

impl TagGroup<'_> {
    pub fn url_path(&self) -> String {
        format!("/tags/{}", self.slug)
    }
}

/// Group `posts` by tag slug, keeping their relative order within each group.
///
/// `posts` is expected in canonical order. A post naming the same tag twice
/// (or two spellings with the same slug) appears once in that group.
pub fn build_tag_index(posts: &[Metadata]) -> Vec<TagGroup<'_>> {
    let mut groups: BTreeMap<String, TagGroup<'_>> = BTreeMap::new();

    for post in posts {
        for tag in &post.tags {
            let slug = tag_slug(tag);
            let group = groups.entry(slug.clone()).or_insert_with(|| TagGroup {
                name: tag.trim().to_owned(),
                slug,
                posts: Vec::new(),
            });
            if !group.posts.last().is_some_and(|last| std::ptr::eq(*last, post)) {
                group.posts.push(post);
            }
        }
    }

    groups.into_values().collect()
}

/// Render and write one page per tag, all tags in parallel.
///
/// Returns the number of distinct tags. A failing tag is recorded on the run.
pub fn build_tag_pages(run: &BuildRun<'_>, templates: &Templates, posts: &[Metadata]) -> usize {
    let groups = build_tag_index(posts);

    rayon::scope(|s| {
        for group in &groups {
            s.spawn(move |_| {
                if let Err(err) = write_tag_page(run, templates, group) {
                    run.errors.record(err);
                }
            });
        }
    });

    run.record_tags(groups.len());
    log!("tags"; "{} tags", groups.len());
    groups.len()
}

fn write_tag_page(run: &BuildRun<'_>, templates: &Templates, group: &TagGroup<'_>) -> Result<()> {
    let html = templates.render_tag(&group.name, &group.posts)?;
    run.sitemap.add_page(&group.url_path())?;

    let path = run
        .config
        .build
        .output
        .join("tags")
        .join(format!("{}.html", group.slug));
    fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))
}
