//! Metadata aggregation and the index page.

use super::tags::build_tag_pages;
use crate::{build::BuildRun, content::Metadata, log};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use std::{cmp::Ordering, fs, sync::mpsc::Receiver, thread::Scope};

/// Front matter date layout, e.g. `03/01/2024`.
const DATE_LAYOUT: &str = "%m/%d/%Y";

/// Total order of posts in every listing.
///
/// Dated posts come first, newest first. Posts whose date does not parse
/// follow, ordered by the raw date string. Remaining ties are broken by slug.
pub fn canonical_cmp(a: &Metadata, b: &Metadata) -> Ordering {
    let by_date = match (parse_date(&a.date), parse_date(&b.date)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.date.cmp(&b.date),
    };
    by_date.then_with(|| a.slug.cmp(&b.slug))
}

pub fn sort_canonical(posts: &mut [Metadata]) {
    posts.sort_by(canonical_cmp);
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_LAYOUT).ok()
}

/// Drain the metadata stream, then write `index.html` and start the tag pages.
///
/// Every entry is registered with the sitemap as it arrives. Rendering waits
/// for both the templates and the scaffolded output directory. The tag pages
/// are built on their own thread in `scope`; this stage and the tag stage
/// each count down the run's static-pages barrier once, whatever happens.
pub fn build_index<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    run: &'env BuildRun<'env>,
    metas: Receiver<Metadata>,
) -> Result<()> {
    let index_done = run.static_pages.guard();
    let tags_done = run.static_pages.guard();

    let mut posts = Vec::new();
    for meta in metas {
        run.sitemap.add_page(&meta.url_path())?;
        posts.push(meta);
    }

    let templates = run
        .templates
        .wait()
        .ok_or_else(|| anyhow!("templates unavailable, not writing index"))?;
    run.scaffolded
        .wait()
        .ok_or_else(|| anyhow!("output directory unavailable, not writing index"))?;

    sort_canonical(&mut posts);

    let html = templates.render_index(&posts)?;
    let path = run.config.build.output.join("index.html");
    fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    run.sitemap.add_page("/")?;
    log!("index"; "{} posts", posts.len());

    scope.spawn(move || {
        let _done = tags_done;
        build_tag_pages(run, templates, &posts);
    });

    drop(index_done);
    Ok(())
}
