//! Text normalization shared by every deduplication path.
//!
//! Questions, flat-list entries and assumption names are all compared through
//! [`normalize`]: trimmed, internal whitespace collapsed to single spaces, and
//! case-folded. Two strings are "the same question" iff their normalized forms
//! are equal.

/// Normalizes text for identity comparison.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns true if both texts normalize to the same value.
pub fn same_text(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Derives a stable lowercase slug (`is-x-true`) from free text.
///
/// Used as the catalog key of promoted assumptions.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
