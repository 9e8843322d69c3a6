//! Small shared helpers: URL normalization and text utilities.

mod text;
pub mod url_normalize;

pub use text::{fold_key, truncate_chars};
pub use url_normalize::normalize_url;
