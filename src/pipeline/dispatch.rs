//! Bounded fan-out of source files to the parser.

use super::{SkipReason, Skipped, SourceFile};
use crate::{
    config::SiteConfig,
    content::{Document, Metadata, PostParser},
    log,
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{
    fs,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::SyncSender,
    },
};

/// Per-file outcome of a dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub parsed: usize,
    pub skipped: Vec<Skipped>,
}

/// Parse every file on a pool of `limit` workers and stream the results.
///
/// Each parsed file yields exactly one [`Document`] on `docs` and one
/// [`Metadata`] on `metas`. Files that cannot be read or parsed are logged and
/// reported as skipped. Returns once every file has been handled; the senders
/// are dropped on return, which closes both streams.
pub fn dispatch(
    files: Vec<SourceFile>,
    limit: usize,
    parser: &dyn PostParser,
    config: &SiteConfig,
    docs: SyncSender<Document>,
    metas: SyncSender<Metadata>,
) -> Result<DispatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limit.max(1))
        .thread_name(|i| format!("parse-{i}"))
        .build()
        .context("Failed to start parse workers")?;

    let parsed = AtomicUsize::new(0);
    let skipped = Mutex::new(Vec::new());
    // Set once a consumer hangs up; remaining files are not parsed.
    let closed = AtomicBool::new(false);

    pool.scope(|s| {
        for file in files {
            let (docs, metas) = (docs.clone(), metas.clone());
            let (parsed, skipped, closed) = (&parsed, &skipped, &closed);

            s.spawn(move |_| {
                if closed.load(Ordering::Relaxed) {
                    return;
                }

                let (doc, meta) = match parse_file(&file, parser, config) {
                    Ok(pair) => pair,
                    Err(reason) => {
                        let skip = Skipped {
                            file: file.path,
                            reason,
                        };
                        log!("skip"; "{skip}");
                        skipped.lock().push(skip);
                        return;
                    }
                };

                if docs.send(doc).is_err() || metas.send(meta).is_err() {
                    closed.store(true, Ordering::Relaxed);
                    return;
                }
                parsed.fetch_add(1, Ordering::Relaxed);
            });
        }
    });

    let mut skipped = skipped.into_inner();
    skipped.sort_by(|a, b| a.file.cmp(&b.file));

    Ok(DispatchReport {
        parsed: parsed.into_inner(),
        skipped,
    })
}

fn parse_file(
    file: &SourceFile,
    parser: &dyn PostParser,
    config: &SiteConfig,
) -> Result<(Document, Metadata), SkipReason> {
    let raw = fs::read(&file.path)?;
    Ok(parser.parse(&file.name, &raw, config)?)
}
