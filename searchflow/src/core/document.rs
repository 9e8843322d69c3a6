//! Extracted documents and named entities.

use serde::{Deserialize, Serialize};

use super::results::SearchResult;
use super::status::DocumentStatus;

/// The text collected for one search result.
///
/// Failed fetches are kept as records so the output stays aligned with the
/// result set it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// URL of the originating search result.
    pub url: String,
    /// Title of the originating search result.
    pub title: String,
    /// Extracted body text; empty unless the status is `Ok`.
    pub text: String,
    /// Fetch outcome.
    pub status: DocumentStatus,
    /// Failure message for `FetchFailed` documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedDocument {
    /// Creates a document from a successful fetch.
    ///
    /// Text that is blank after trimming yields an `Empty` document.
    #[must_use]
    pub fn fetched(source: &SearchResult, text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        let (text, status) = if trimmed.is_empty() {
            (String::new(), DocumentStatus::Empty)
        } else {
            (trimmed.to_string(), DocumentStatus::Ok)
        };
        Self {
            url: source.url.clone(),
            title: source.title.clone(),
            text,
            status,
            error: None,
        }
    }

    /// Creates a document for a failed fetch.
    #[must_use]
    pub fn failed(source: &SearchResult, error: impl ToString) -> Self {
        Self {
            url: source.url.clone(),
            title: source.title.clone(),
            text: String::new(),
            status: DocumentStatus::FetchFailed,
            error: Some(error.to_string()),
        }
    }

    /// Returns true if the document has usable text.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.is_usable()
    }
}

/// An entity as reported by an extractor, before merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Surface form as it appears in the text.
    pub text: String,
    /// Category label (e.g. PERSON, ORGANIZATION, LOCATION).
    pub label: String,
}

impl RawEntity {
    /// Creates a new raw entity.
    #[must_use]
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// A merged entity with its occurrence count across all documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// First-seen surface form, trimmed.
    pub text: String,
    /// Category label.
    pub label: String,
    /// Number of occurrences across documents.
    pub count: usize,
}
