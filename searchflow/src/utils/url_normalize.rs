//! URL normalization for search result deduplication.
//!
//! Two URLs that differ only in scheme/host casing, a default port, the
//! query string, the fragment or a trailing slash refer to the same source
//! and must share one slot in a [`ResultSet`](crate::core::ResultSet).

use url::Url;

/// Normalize a URL into its deduplication key.
///
/// Applies the following transformations:
///
/// 1. Lowercase scheme and host (path is preserved as-is).
/// 2. Remove user info and default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Drop the query string and the fragment.
/// 4. Remove a trailing slash from the path (unless the path is exactly `"/"`).
///
/// Input that cannot be parsed as an absolute URL is returned trimmed.
///
/// # Examples
///
/// ```
/// use searchflow::utils::normalize_url;
///
/// let a = normalize_url("HTTPS://Example.COM/path/?utm_source=x#top");
/// let b = normalize_url("https://example.com/path");
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    parsed.set_fragment(None);
    parsed.set_query(None);

    if !parsed.cannot_be_a_base() {
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);
    }

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    // Url::parse already lowercases scheme and host.
    parsed.to_string()
}

fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
