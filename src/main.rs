//! easyblog - A static site generator for markdown blogs.

mod build;
mod cli;
mod config;
mod content;
mod generator;
mod init;
mod logger;
mod pipeline;
mod serve;
mod templates;
mod utils;
mod watch;

use anyhow::{Result, bail};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use content::{MarkdownParser, PostParser};
use generator::{ImageGenerator, OgRenderer};
use init::new_site;
use serve::{bind_server, local_url, serve_site};
use std::path::{Path, PathBuf};

static PARSER: MarkdownParser = MarkdownParser;
static IMAGES: OgRenderer = OgRenderer::new();

fn main() {
    if let Err(e) = run() {
        log!("error"; "{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    if let Some(target) = quickstart_target(cli) {
        return new_site(&target);
    }

    let mut config = load_config(cli)?;
    let parser: &'static dyn PostParser = &PARSER;
    let images: &'static dyn ImageGenerator = &IMAGES;

    if let Commands::Serve { .. } = &cli.command {
        // Links in the served pages point at the address actually bound.
        let (server, addr) = bind_server(&config)?;
        config.base.url = Some(local_url(addr));
        config.validate()?;
        let config: &'static SiteConfig = Box::leak(Box::new(config));

        // Keep serving; the watcher retries on the next change.
        if let Err(e) = build_site(config, parser, images) {
            log!("error"; "initial build failed: {e:#}");
        }
        return serve_site(server, addr, config, parser, images);
    }

    config.validate()?;
    let config: &'static SiteConfig = Box::leak(Box::new(config));
    build_site(config, parser, images).map(|_| ())
}

/// Directory a `quickstart` scaffolds into, resolved against `--root`.
fn quickstart_target(cli: &Cli) -> Option<PathBuf> {
    match &cli.command {
        Commands::Quickstart { target } => {
            let root = cli.root.as_deref().unwrap_or(Path::new("./"));
            Some(root.join(target))
        }
        _ => None,
    }
}

/// Load configuration and apply CLI overrides; validation happens once the
/// command has settled the base URL.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!(
            "Config file `{}` not found. Run `easyblog quickstart` to create one.",
            config_path.display()
        );
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);

    Ok(config)
}
