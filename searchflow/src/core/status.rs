//! Document status and stage name enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Query expansion through the language model.
    Expand,
    /// Search fan-out and URL deduplication.
    Aggregate,
    /// Concurrent page fetching.
    Collect,
    /// Optional named-entity annotation.
    Annotate,
    /// Final overview generation.
    Synthesize,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::Expand,
        Self::Aggregate,
        Self::Collect,
        Self::Annotate,
        Self::Synthesize,
    ];
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expand => write!(f, "expand"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::Collect => write!(f, "collect"),
            Self::Annotate => write!(f, "annotate"),
            Self::Synthesize => write!(f, "synthesize"),
        }
    }
}

/// Outcome of fetching one search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Text was fetched and is non-empty.
    Ok,
    /// The fetch errored or timed out.
    FetchFailed,
    /// The fetch succeeded but yielded no text (paywall, JS-only page).
    Empty,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::FetchFailed => write!(f, "fetch_failed"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

impl DocumentStatus {
    /// Returns true if the document can feed entities and synthesis.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        let names: Vec<String> = StageName::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["expand", "aggregate", "collect", "annotate", "synthesize"]);
    }

    #[test]
    fn test_document_status_serialize() {
        let json = serde_json::to_string(&DocumentStatus::FetchFailed).unwrap();
        assert_eq!(json, r#""fetch_failed""#);

        let deserialized: DocumentStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, DocumentStatus::FetchFailed);
    }

    #[test]
    fn test_document_status_is_usable() {
        assert!(DocumentStatus::Ok.is_usable());
        assert!(!DocumentStatus::Empty.is_usable());
        assert!(!DocumentStatus::FetchFailed.is_usable());
    }
}
