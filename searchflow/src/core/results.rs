//! Search hits and the deduplicated result set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::normalize_url;

/// A raw result record as returned by a search provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Short text excerpt.
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    /// Creates a new search hit.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A search result accepted into a [`ResultSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// URL as returned by the provider.
    pub url: String,
    /// Result title.
    pub title: String,
    /// Short text excerpt.
    pub snippet: String,
    /// The expanded query that first produced this result.
    pub source_query: String,
}

/// Insertion-ordered search results keyed by normalized URL.
///
/// The first result seen for a normalized URL wins; later duplicates are
/// rejected. Iteration order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    results: Vec<SearchResult>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a hit found by `source_query`.
    ///
    /// Returns `false` if the hit has no URL or its normalized URL is
    /// already present.
    pub fn insert(&mut self, hit: SearchHit, source_query: &str) -> bool {
        if hit.url.trim().is_empty() {
            return false;
        }
        let key = normalize_url(&hit.url);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.results.len());
        self.results.push(SearchResult {
            url: hit.url.trim().to_string(),
            title: hit.title.trim().to_string(),
            snippet: hit.snippet.trim().to_string(),
            source_query: source_query.to_string(),
        });
        true
    }

    /// Returns true if a URL with the same normalized form is present.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(&normalize_url(url))
    }

    /// Looks up a result by any URL with the same normalized form.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&SearchResult> {
        self.index
            .get(&normalize_url(url))
            .and_then(|&i| self.results.get(i))
    }

    /// Returns the results in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[SearchResult] {
        &self.results
    }

    /// Returns an iterator over the results in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.results.iter()
    }

    /// Returns the number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
