//! Post rendering and output writing.

use crate::{build::BuildRun, content::Document};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, SyncSender},
    },
};

/// A document together with its rendered page.
#[derive(Debug)]
pub struct RenderedPost {
    pub doc: Document,
    pub html: String,
}

/// Render every incoming document through `post.html`.
///
/// Blocks until the templates are ready. Returns the number of rendered
/// posts; the output stream closes when this returns.
pub fn render_posts(
    run: &BuildRun<'_>,
    docs: Receiver<Document>,
    rendered: SyncSender<RenderedPost>,
) -> Result<usize> {
    let templates = run
        .templates
        .wait()
        .ok_or_else(|| anyhow!("templates unavailable, not rendering posts"))?;

    let mut count = 0;
    for doc in docs {
        let html = templates.render_post(&doc)?;
        if rendered.send(RenderedPost { doc, html }).is_err() {
            break;
        }
        count += 1;
    }

    Ok(count)
}

/// Persist rendered posts and their preview images.
///
/// Blocks until the output directory is scaffolded. Every post gets its own
/// task writing the page and generating the image side by side. The first
/// failure is recorded on the run and stops the intake of further posts.
pub fn write_posts(run: &BuildRun<'_>, rendered: Receiver<RenderedPost>) -> Result<usize> {
    run.scaffolded
        .wait()
        .ok_or_else(|| anyhow!("output directory unavailable, not writing posts"))?;

    let written = AtomicUsize::new(0);

    rayon::in_place_scope(|s| {
        for post in rendered.iter() {
            if run.errors.is_set() {
                break;
            }
            let written = &written;
            s.spawn(move |_| {
                let (page, image) = rayon::join(|| write_page(run, &post), || write_image(run, &post.doc));
                match page.and(image) {
                    Ok(()) => {
                        written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => run.errors.record(err),
                }
            });
        }
    });

    Ok(written.into_inner())
}

fn write_page(run: &BuildRun<'_>, post: &RenderedPost) -> Result<()> {
    let path = run
        .config
        .build
        .output
        .join("post")
        .join(format!("{}.html", post.doc.slug));
    fs::write(&path, &post.html).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_image(run: &BuildRun<'_>, doc: &Document) -> Result<()> {
    let Some(og) = run.config.og_image() else {
        return Ok(());
    };
    let path = run
        .config
        .build
        .output
        .join("images")
        .join(format!("{}.png", doc.slug));

    run.images
        .generate(&doc.title, &path, og)
        .with_context(|| format!("Failed to generate image for `{}`", doc.slug))
}
