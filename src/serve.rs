//! Development server with live rebuild.
//!
//! A lightweight HTTP server on `tiny_http` serving the build output:
//!
//! - Static file serving from the output directory
//! - `index.html` resolution for directories
//! - Extension-less URLs: `/post/hello` serves `post/hello.html`
//! - File watching and auto-rebuild (via `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Handle requests         Detect changes
//!    Serve files             Rebuild site
//! └─────────────────────────────────────────────┘
//!                    │
//!                    ▼
//!            config.build.output
//! ```

use crate::{
    config::SiteConfig, content::PostParser, generator::ImageGenerator, log,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Bind the server on `[serve] interface:port`, moving to the next free port
/// when that one is taken.
pub fn bind_server(config: &SiteConfig) -> Result<(Server, SocketAddr)> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;

    try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)
}

/// Base URL under which a server bound to `addr` is reachable locally.
///
/// A wildcard interface is reached through loopback.
pub fn local_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

/// Serve the output directory with optional file watching.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(
    server: Server,
    addr: SocketAddr,
    config: &'static SiteConfig,
    parser: &'static dyn PostParser,
    images: &'static dyn ImageGenerator,
) -> Result<()> {
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "listening on {}, browse {}", addr, local_url(addr));

    if config.serve.watch {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(config, parser, images) {
                log!("watch"; "{err:#}");
            }
        });
    }

    let root = &config.build.output;
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Where a request path leads inside the served directory.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    NotFound,
    Forbidden,
}

/// Map a request URL onto a file under `root`.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`
/// 3. No extension and `<path>.html` exists
/// 4. Nothing found
fn resolve(root: &Path, url: &str) -> Resolved {
    // Query strings (e.g. cache-busting `?t=123`) and fragments are not part
    // of the file name.
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let Ok(decoded) = urlencoding::decode(path) else {
        return Resolved::NotFound;
    };

    let request_path = decoded.trim_matches('/');
    if request_path.split(['/', '\\']).any(|segment| segment == "..") {
        return Resolved::Forbidden;
    }

    let local_path = root.join(request_path);
    if local_path.is_file() {
        return Resolved::File(local_path);
    }

    if local_path.is_dir() {
        let index_path = local_path.join("index.html");
        if index_path.is_file() {
            return Resolved::File(index_path);
        }
    }

    if !request_path.is_empty() && Path::new(request_path).extension().is_none() {
        let html_path = root.join(format!("{request_path}.html"));
        if html_path.is_file() {
            return Resolved::File(html_path);
        }
    }

    Resolved::NotFound
}

/// Handle a single HTTP request.
fn handle_request(request: Request, root: &Path) -> Result<()> {
    match resolve(root, request.url()) {
        Resolved::File(path) => serve_file(request, &path),
        Resolved::NotFound => serve_status(request, 404, "404 Not Found"),
        Resolved::Forbidden => serve_status(request, 403, "403 Forbidden"),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header value `{value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type(guess_content_type(path))?);

    request.respond(response)?;
    Ok(())
}

fn serve_status(request: Request, status: u16, body: &'static str) -> Result<()> {
    let response = Response::new(
        StatusCode(status),
        vec![content_type("text/plain")?],
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}
