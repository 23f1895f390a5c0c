//! Site configuration management for `easyblog.toml`.
//!
//! # Sections
//!
//! | Section          | Purpose                                          |
//! |------------------|--------------------------------------------------|
//! | `[base]`         | Site identity (base url)                         |
//! | `[build]`        | Paths, pipeline sizing, code style               |
//! | `[build.og_image]` | Social-card icon, font and size                |
//! | `[build.static]` | Verbatim passthrough directory                   |
//! | `[serve]`        | Development server (port, interface, watch)      |
//!
//! # Example
//!
//! ```toml
//! [base]
//! url = "https://blog.example.com"
//!
//! [build]
//! output = "out"
//! code_style = "github"
//!
//! [serve]
//! port = 8080
//! ```
//!
//! The configuration is built once in `main` and handed to every consumer by
//! reference; nothing reads it through a global.

mod base;
mod build;
pub mod defaults;
mod error;
mod serve;

pub use build::OgImageConfig;
pub use error::ConfigError;

use base::BaseConfig;
use build::BuildConfig;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing easyblog.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Project root every relative path is resolved against
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site identity
    #[serde(default)]
    pub base: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Base URL without a trailing slash, empty when unset.
    pub fn base_url(&self) -> &str {
        self.base.url.as_deref().unwrap_or("").trim_end_matches('/')
    }

    /// `<input>/posts`
    pub fn posts_dir(&self) -> PathBuf {
        self.build.input.join("posts")
    }

    /// `<input>/templates`
    pub fn templates_dir(&self) -> PathBuf {
        self.build.input.join("templates")
    }

    /// `<input>/assets`
    pub fn assets_dir(&self) -> PathBuf {
        self.build.input.join("assets")
    }

    /// `<input>/<static.path>`, if passthrough is configured.
    pub fn static_dir(&self) -> Option<PathBuf> {
        self.build
            .static_files
            .path
            .as_ref()
            .map(|path| self.build.input.join(path))
    }

    /// Social-card settings, `None` when image generation is disabled.
    pub fn og_image(&self) -> Option<&OgImageConfig> {
        self.build.og_image.as_ref()
    }

    /// Update configuration with CLI arguments and resolve every path
    /// against the project root.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        let root = normalize_path(&root);

        self.config_path = normalize_path(&root.join(&cli.config));
        self.build.input = normalize_path(&root.join(&self.build.input));
        self.build.output = normalize_path(&root.join(&self.build.output));
        if let Some(og) = self.build.og_image.as_mut() {
            og.icon_path = normalize_path(&root.join(&og.icon_path));
            og.font_path = normalize_path(&root.join(&og.font_path));
        }
        self.root = root;

        if let Commands::Serve {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate configuration before a build
    pub fn validate(&self) -> Result<()> {
        match self.base.url.as_deref() {
            None => bail!(ConfigError::Validation("[base.url] is required".into())),
            Some(url) if !url.starts_with("http") => bail!(ConfigError::Validation(
                "[base.url] must start with http:// or https://".into()
            )),
            _ => {}
        }

        if self.build.max_concurrent_parses == 0 {
            bail!(ConfigError::Validation(
                "[build.max_concurrent_parses] must be at least 1".into()
            ));
        }

        if self.build.queue_depth == 0 {
            bail!(ConfigError::Validation(
                "[build.queue_depth] must be at least 1".into()
            ));
        }

        if let Some(og) = &self.build.og_image
            && og.font_size <= 0.0
        {
            bail!(ConfigError::Validation(
                "[build.og_image.font_size] must be positive".into()
            ));
        }

        if self.build.output == self.build.input {
            bail!(ConfigError::Validation(
                "[build.output] must differ from [build.input]".into()
            ));
        }

        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
