//! Text helpers shared by the stages.

/// Returns the comparison key used for case-insensitive deduplication.
#[must_use]
pub fn fold_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
