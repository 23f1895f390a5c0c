//! URL slugification for tags and heading anchors.

/// Characters that never make it into an output file name.
const FORBIDDEN_CHARS: &[char] = &[
    '<', '>', ':', '|', '?', '*', '#', '\\', '/', '"', '\t', '\r', '\n',
];

/// URL-safe name of a tag page: lowercased, spaces replaced with hyphens.
///
/// Path separators and other characters that are unsafe in file names are
/// dropped, so the result is always a single path component.
///
/// `"Rust Async"` → `"rust-async"`
pub fn tag_slug(tag: &str) -> String {
    let slug: String = tag
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();

    match slug.as_str() {
        "" | "." | ".." => "_".to_owned(),
        _ => slug,
    }
}

/// Anchor id for a heading: lowercase alphanumerics joined by single hyphens.
///
/// `"Setup  cargo!"` → `"setup-cargo"`
pub fn anchor_slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    out
}
