//! The validated user query and its expansion.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::InputError;
use crate::utils::fold_key;

/// A user query that is non-empty after trimming.
///
/// The raw text is kept verbatim; trimming only applies to validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Validates and wraps a raw query string.
    pub fn new(raw: impl Into<String>) -> Result<Self, InputError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InputError::EmptyQuery);
        }
        Ok(Self(raw))
    }

    /// Returns the query text exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Query {
    type Error = InputError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free list of search queries.
///
/// Element 0 is always the original query, verbatim. Further entries are
/// trimmed and compared case-insensitively; the kept copy preserves the
/// casing it arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedQuerySet {
    queries: Vec<String>,
    #[serde(skip)]
    seen: HashSet<String>,
    #[serde(skip)]
    capacity: usize,
}

impl ExpandedQuerySet {
    /// Creates a set holding only the original query.
    ///
    /// `capacity` bounds the total size including the original; it is
    /// never lower than one.
    #[must_use]
    pub fn new(original: &Query, capacity: usize) -> Self {
        let mut seen = HashSet::new();
        seen.insert(fold_key(original.as_str()));
        Self {
            queries: vec![original.as_str().to_string()],
            seen,
            capacity: capacity.max(1),
        }
    }

    /// Adds a candidate query.
    ///
    /// Returns `false` if the candidate is blank, a case-insensitive
    /// duplicate, or the set is already full.
    pub fn try_push(&mut self, candidate: &str) -> bool {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || self.is_full() {
            return false;
        }
        if !self.seen.insert(fold_key(trimmed)) {
            return false;
        }
        self.queries.push(trimmed.to_string());
        true
    }

    /// Returns true when no more queries can be added.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queries.len() >= self.capacity
    }

    /// Returns the original query.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.queries[0]
    }

    /// Returns the queries in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.queries
    }

    /// Returns an iterator over the queries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.queries.iter()
    }

    /// Returns the number of queries, including the original.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Always false: the original query is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Consumes the set, returning the queries in order.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.queries
    }
}

impl<'a> IntoIterator for &'a ExpandedQuerySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
