//! Social-preview card rendering.
//!
//! ```text
//! ┌──────────────────────────────────────────── 1200 ─┐
//! │  Post title, word-wrapped inside the padding      │
//! │  with a line height of 1.5 × font size            │
//! │                                                   │ 630
//! │  ( icon )                                         │
//! └───────────────────────────────────────────────────┘
//! ```

use crate::config::OgImageConfig;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage, imageops::FilterType};
use parking_lot::Mutex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 630;
const PADDING: f32 = 40.0;
const ICON_RADIUS: f32 = 50.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 250, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([51, 51, 51, 255]);

/// Produces the per-post preview image.
///
/// Called concurrently from the output writer, one call per post.
pub trait ImageGenerator: Sync {
    fn generate(&self, title: &str, out_path: &Path, config: &OgImageConfig) -> Result<()>;
}

/// Default card renderer.
///
/// Font and icon are loaded once and shared by every card of a build. They
/// are reloaded when either path or modification time changes, so edits are
/// picked up by the next rebuild.
pub struct OgRenderer {
    assets: Cached<CardAssets>,
}

struct CardAssets {
    font: FontVec,
    icon: RgbaImage,
}

impl OgRenderer {
    pub const fn new() -> Self {
        Self {
            assets: Cached::new(),
        }
    }

    fn assets(&self, config: &OgImageConfig) -> Result<Arc<CardAssets>> {
        let key = [
            FileStamp::of(&config.font_path),
            FileStamp::of(&config.icon_path),
        ];
        self.assets.get_or_load(key, || {
            let font = load_font(&config.font_path)?;
            let icon = image::open(&config.icon_path)
                .with_context(|| format!("Failed to load icon {}", config.icon_path.display()))?
                .to_rgba8();
            Ok(CardAssets { font, icon })
        })
    }
}

impl Default for OgRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageGenerator for OgRenderer {
    fn generate(&self, title: &str, out_path: &Path, config: &OgImageConfig) -> Result<()> {
        let assets = self.assets(config)?;

        let card = render_card(title, &assets.font, config.font_size, &assets.icon);
        card.save(out_path)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        Ok(())
    }
}

/// Identity of an input file: its path and last modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: fs::metadata(path).and_then(|m| m.modified()).ok(),
        }
    }
}

/// Single-slot cache, refilled when the key changes. Failed loads are not
/// cached.
struct Cached<T> {
    slot: Mutex<Option<([FileStamp; 2], Arc<T>)>>,
}

impl<T> Cached<T> {
    const fn new() -> Self {
        Self {
            slot: parking_lot::const_mutex(None),
        }
    }

    fn get_or_load(&self, key: [FileStamp; 2], load: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let mut slot = self.slot.lock();
        if let Some((cached_key, value)) = slot.as_ref()
            && *cached_key == key
        {
            return Ok(Arc::clone(value));
        }

        let value = Arc::new(load()?);
        *slot = Some((key, Arc::clone(&value)));
        Ok(value)
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("Invalid font {}", path.display()))
}

fn render_card(title: &str, font: &FontVec, font_size: f32, icon: &RgbaImage) -> RgbaImage {
    let mut card = RgbaImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let scale = PxScale::from(font_size);
    let line_height = font_size * 1.5;
    let max_width = WIDTH as f32 - 2.0 * PADDING;

    for (i, line) in word_wrap(title, max_width, |s| text_width(font, scale, s))
        .iter()
        .enumerate()
    {
        let baseline = PADDING + i as f32 * line_height + line_height * 0.8;
        draw_text(&mut card, font, scale, line, PADDING, baseline);
    }

    draw_circular_icon(&mut card, icon);
    card
}

/// Greedy word wrap. A single word wider than `max_width` gets a line of its own.
fn word_wrap(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_owned()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn text_width(font: &FontVec, scale: PxScale, text: &str) -> f32 {
    let font = font.as_scaled(scale);
    let mut width = 0.0;
    let mut previous = None;

    for c in text.chars() {
        let id = font.glyph_id(c);
        if let Some(prev) = previous {
            width += font.kern(prev, id);
        }
        width += font.h_advance(id);
        previous = Some(id);
    }

    width
}

fn draw_text(card: &mut RgbaImage, font: &FontVec, scale: PxScale, text: &str, x: f32, baseline: f32) {
    let scaled = font.as_scaled(scale);
    let mut caret = x;
    let mut previous = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);

        let Some(outline) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outline.px_bounds();
        outline.draw(|gx, gy, coverage| {
            let px = bounds.min.x as i32 + gx as i32;
            let py = bounds.min.y as i32 + gy as i32;
            if px < 0 || py < 0 || px >= WIDTH as i32 || py >= HEIGHT as i32 {
                return;
            }
            let pixel = card.get_pixel_mut(px as u32, py as u32);
            *pixel = blend(*pixel, TEXT_COLOR, coverage);
        });
    }
}

/// Scale the icon to fit the circle's bounding square, center it on the
/// circle and clip everything outside the radius.
fn draw_circular_icon(card: &mut RgbaImage, icon: &RgbaImage) {
    let (icon_w, icon_h) = icon.dimensions();
    if icon_w == 0 || icon_h == 0 {
        return;
    }

    let diameter = 2.0 * ICON_RADIUS;
    let fit = (diameter / icon_w as f32).min(diameter / icon_h as f32);
    let scaled_w = ((icon_w as f32 * fit).round() as u32).max(1);
    let scaled_h = ((icon_h as f32 * fit).round() as u32).max(1);
    let scaled = image::imageops::resize(icon, scaled_w, scaled_h, FilterType::Lanczos3);

    let cx = PADDING + ICON_RADIUS;
    let cy = HEIGHT as f32 - PADDING - ICON_RADIUS;
    let left = cx - scaled_w as f32 / 2.0;
    let top = cy - scaled_h as f32 / 2.0;

    for (ix, iy, src) in scaled.enumerate_pixels() {
        let px = left + ix as f32;
        let py = top + iy as f32;
        let (dx, dy) = (px + 0.5 - cx, py + 0.5 - cy);
        if dx * dx + dy * dy > ICON_RADIUS * ICON_RADIUS {
            continue;
        }
        if px < 0.0 || py < 0.0 || px >= WIDTH as f32 || py >= HEIGHT as f32 {
            continue;
        }
        let pixel = card.get_pixel_mut(px as u32, py as u32);
        *pixel = blend(*pixel, Rgba([src[0], src[1], src[2], 255]), src[3] as f32 / 255.0);
    }
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mix = |d: u8, s: u8| (d as f32 * (1.0 - alpha) + s as f32 * alpha).round() as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), 255])
}
