//! File system watcher for live rebuild.
//!
//! Every directory under the input directory is watched non-recursively,
//! except the output directory and anything below it. Directories created
//! later are added as they appear.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Watcher thread                          │
//! │                                                          │
//! │  ┌──────────┐    ┌────────────┐    ┌──────────────────┐  │
//! │  │ notify   │───▶│ Debouncer  │───▶│ Idle ─▶ Building │  │
//! │  │ events   │    │ (window ms)│    │  full BuildRun   │  │
//! │  └──────────┘    └────────────┘    └──────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Rebuilds run on the watcher thread itself, so they never overlap; events
//! arriving during a rebuild wait in the channel and are handled afterwards.

use crate::{
    build::{BuildReport, build_site},
    config::SiteConfig,
    content::PostParser,
    generator::ImageGenerator,
    log,
};
use anyhow::{Context, Result, bail};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};
use walkdir::WalkDir;

/// How long to block for events while nothing is pending.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Paths whose changes never trigger a rebuild.
fn is_ignored(path: &Path, output: &Path) -> bool {
    path.starts_with(output) || is_temp_file(path)
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Format path as relative to root for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events into one rebuild.
struct Debouncer {
    window: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut added = false;
        for path in paths {
            self.pending.insert(path);
            added = true;
        }
        if added {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        match self.last_event {
            Some(t) if !self.pending.is_empty() => self.window.saturating_sub(t.elapsed()),
            _ => IDLE_TIMEOUT,
        }
    }
}

// =============================================================================
// Rebuild Loop
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Idle,
    Building,
}

/// Debounced rebuild driver, independent of the event source.
struct RebuildLoop<F> {
    state: WatchState,
    debouncer: Debouncer,
    output: PathBuf,
    rebuild: F,
}

impl<F> RebuildLoop<F>
where
    F: FnMut(&[PathBuf]) -> Result<BuildReport>,
{
    fn new(window: Duration, output: PathBuf, rebuild: F) -> Self {
        Self {
            state: WatchState::Idle,
            debouncer: Debouncer::new(window),
            output,
            rebuild,
        }
    }

    fn on_event(&mut self, event: Event) {
        if !is_relevant(&event) {
            return;
        }
        let output = &self.output;
        self.debouncer
            .add(event.paths.into_iter().filter(|p| !is_ignored(p, output)));
    }

    /// Run one rebuild if the debounce window has passed. Returns whether a
    /// rebuild was attempted.
    fn tick(&mut self) -> bool {
        if self.state != WatchState::Idle || !self.debouncer.ready() {
            return false;
        }

        self.state = WatchState::Building;
        let changed = self.debouncer.take();
        if let Err(err) = (self.rebuild)(&changed) {
            log!("watch"; "build failed");
            log!("error"; "{err:#}");
        }
        self.state = WatchState::Idle;
        true
    }
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Watch `dir` and every directory below it, skipping `output`.
///
/// Returns the number of registered directories. Directories that cannot be
/// watched are logged and skipped.
fn watch_tree(watcher: &mut impl Watcher, dir: &Path, output: &Path) -> usize {
    let mut count = 0;

    let dirs = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(output))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir());

    for entry in dirs {
        match watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
            Ok(()) => count += 1,
            Err(err) => log!("watch"; "cannot watch {}: {err}", entry.path().display()),
        }
    }

    count
}

/// Start blocking file watcher with debouncing and live rebuild.
pub fn watch_for_changes_blocking(
    config: &'static SiteConfig,
    parser: &'static dyn PostParser,
    images: &'static dyn ImageGenerator,
) -> Result<()> {
    let input = &config.build.input;
    let output = &config.build.output;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    let count = watch_tree(&mut watcher, input, output);
    if count == 0 {
        bail!("Failed to watch {}", input.display());
    }
    log!("watch"; "{} directories under {}", count, input.display());

    let root = config.get_root();
    let mut rebuilds = RebuildLoop::new(
        Duration::from_millis(config.serve.debounce_ms),
        output.clone(),
        |changed: &[PathBuf]| {
            let names: Vec<_> = changed.iter().map(|p| rel_path(p, root)).collect();
            log!("watch"; "{} changed, rebuilding...", names.join(", "));
            build_site(config, parser, images)
        },
    );

    loop {
        match rx.recv_timeout(rebuilds.debouncer.timeout()) {
            Ok(Ok(event)) => {
                if matches!(event.kind, EventKind::Create(_)) {
                    for path in event.paths.iter().filter(|p| p.is_dir()) {
                        watch_tree(&mut watcher, path, output);
                    }
                }
                rebuilds.on_event(event);
            }
            Ok(Err(err)) => log!("watch"; "error: {err}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        rebuilds.tick();
    }

    Ok(())
}
