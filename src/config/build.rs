//! `[build]` section configuration.
//!
//! Contains source/output paths, pipeline sizing, and the inputs handed to
//! the parser and the social-card generator.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in easyblog.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// input = "."                 # holds posts/, templates/, assets/
/// output = "out"
/// code_style = "monokai"
/// max_concurrent_parses = 8
/// queue_depth = 16
///
/// [build.og_image]
/// icon_path = "og/me.png"
/// font_path = "og/Inter.ttf"
/// font_size = 72.0
///
/// [build.static]
/// path = "static"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source root containing `posts/`, `templates/` and `assets/`.
    #[serde(default = "defaults::build::input")]
    #[educe(Default = defaults::build::input())]
    pub input: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Highlighting theme name, passed through to the post parser.
    #[serde(default = "defaults::build::code_style")]
    #[educe(Default = defaults::build::code_style())]
    pub code_style: String,

    /// Upper bound on posts parsed at the same time.
    #[serde(default = "defaults::build::max_concurrent_parses")]
    #[educe(Default = defaults::build::max_concurrent_parses())]
    pub max_concurrent_parses: usize,

    /// Buffer depth of the queues between pipeline stages.
    #[serde(default = "defaults::build::queue_depth")]
    #[educe(Default = defaults::build::queue_depth())]
    pub queue_depth: usize,

    /// Social-card generation. Absent disables image output.
    #[serde(default)]
    pub og_image: Option<OgImageConfig>,

    /// Directory copied verbatim into the output root.
    #[serde(default, rename = "static")]
    pub static_files: StaticConfig,
}

/// `[build.og_image]` section - inputs of the social-card renderer.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct OgImageConfig {
    /// Round avatar drawn in the bottom-left corner.
    #[serde(default = "defaults::build::og_image::icon_path")]
    #[educe(Default = defaults::build::og_image::icon_path())]
    pub icon_path: PathBuf,

    /// TrueType/OpenType font used for the title.
    #[serde(default = "defaults::build::og_image::font_path")]
    #[educe(Default = defaults::build::og_image::font_path())]
    pub font_path: PathBuf,

    /// Title size in pixels.
    #[serde(default = "defaults::build::og_image::font_size")]
    #[educe(Default = defaults::build::og_image::font_size())]
    pub font_size: f32,
}

/// `[build.static]` section - verbatim passthrough directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticConfig {
    /// Path relative to the input directory; unset disables passthrough.
    #[serde(default)]
    pub path: Option<PathBuf>,
}
