//! Build artifacts that are not rendered through templates.

pub mod og_image;
pub mod sitemap;

pub use og_image::{ImageGenerator, OgRenderer};
pub use sitemap::Sitemap;
