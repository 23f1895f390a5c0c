//! Build pipeline stages.
//!
//! ```text
//!                       ┌──────────────┐  Document   ┌────────┐  RenderedPost  ┌────────┐
//!  scan ─► dispatch ───►│ docs (bounded)├───────────►│ render ├───────────────►│ writer │─► post/, images/
//!            │          └──────────────┘             └───▲────┘                └───▲────┘
//!            │ Metadata                      templates gate                scaffold gate
//!            ▼                                           │                         │
//!        ┌───────┐ ◄─────────────────────────────────────┴─────────────────────────┘
//!        │ index │─► index.html ─► tags (one task per tag) ─► tags/
//!        └───────┘
//!            └─────── static pages barrier ──► sitemap.xml ─► static passthrough
//! ```
//!
//! Each stage owns its receiving end. A stage that fails drops its receiver,
//! so upstream sends fail and the producer winds down instead of blocking.

mod dispatch;
mod index;
mod render;
mod scaffold;
mod scan;
pub mod signal;
mod tags;

pub use dispatch::{DispatchReport, dispatch};
pub use index::build_index;
pub use render::{render_posts, write_posts};
pub use scaffold::scaffold_output;
pub use scan::{SourceFile, scan_posts};

use crate::content::ParseError;
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// A source file left out of the build.
#[derive(Debug)]
pub struct Skipped {
    pub file: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("cannot read: {0}")]
    Read(#[from] io::Error),

    #[error("cannot parse: {0}")]
    Parse(#[from] ParseError),
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.reason)
    }
}
