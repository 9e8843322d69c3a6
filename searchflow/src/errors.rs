//! Error types for the searchflow pipeline.
//!
//! Only a handful of errors ever reach the caller of a pipeline run: invalid
//! input, a failed synthesis call, an expired run deadline or a caller
//! cancellation. Everything raised by the external capabilities during the
//! earlier stages is absorbed and recorded as a [`Degradation`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// The main error type for searchflow operations.
#[derive(Debug, Error)]
pub enum SearchflowError {
    /// The query was empty or otherwise invalid.
    #[error("{0}")]
    Input(#[from] InputError),

    /// The final language-model call failed, so no overview exists.
    #[error("Synthesis failed: {0}")]
    Synthesis(#[source] GenerationError),

    /// The run deadline expired before the overview was produced.
    #[error("Pipeline timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The caller cancelled the run.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// Invalid configuration or an incompletely assembled pipeline.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchflowError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short stable name of the error kind, used in events and reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "InputError",
            Self::Synthesis(_) => "SynthesisFailure",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled(_) => "Cancelled",
            Self::Config(_) => "ConfigError",
            Self::Serialization(_) => "SerializationError",
            Self::Io(_) => "IoError",
        }
    }
}

impl From<serde_json::Error> for SearchflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a query fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The query is empty or whitespace only.
    #[error("Query must not be empty")]
    EmptyQuery,
}

/// Failure of a [`SearchProvider`](crate::providers::SearchProvider) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The provider rejected the request because a quota was exhausted.
    #[error("Search quota exceeded: {0}")]
    Quota(String),

    /// The provider rejected the credentials.
    #[error("Search authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout or server-side error.
    #[error("Search request failed: {0}")]
    Transient(String),

    /// The provider answered with something that could not be parsed.
    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    /// Whether retrying the call could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failure of a [`PageFetcher`](crate::providers::PageFetcher) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The response is not a text document.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// The fetch did not finish in time.
    #[error("Fetch timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The body exceeded the configured size cap.
    #[error("Response too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Configured maximum in bytes.
        max: u64,
    },
}

impl FetchError {
    /// Whether retrying the call could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::UnsupportedContentType(_) | Self::TooLarge { .. } => false,
        }
    }
}

/// Failure of an [`EntityExtractor`](crate::providers::EntityExtractor) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The model or service backing the extractor is unavailable.
    #[error("Entity extraction unavailable: {0}")]
    Unavailable(String),

    /// The extractor output could not be interpreted.
    #[error("Invalid entity extraction output: {0}")]
    InvalidResponse(String),
}

/// Failure of a [`LanguageModel`](crate::providers::LanguageModel) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The API rejected the credentials.
    #[error("Model authentication failed: {0}")]
    Auth(String),

    /// Rate limit or quota exhausted.
    #[error("Model quota exceeded: {0}")]
    Quota(String),

    /// The call did not finish in time.
    #[error("Model call timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Connection or server failure.
    #[error("Model request failed: {0}")]
    Transport(String),

    /// The response did not contain generated text.
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Whether retrying the call could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

/// The pipeline stage an absorbed failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStage {
    /// Query expansion.
    Expansion,
    /// Search aggregation.
    Search,
    /// Page fetching.
    Fetch,
    /// Entity extraction.
    Entities,
}

impl std::fmt::Display for DegradedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expansion => write!(f, "expansion"),
            Self::Search => write!(f, "search"),
            Self::Fetch => write!(f, "fetch"),
            Self::Entities => write!(f, "entities"),
        }
    }
}

/// Record of an upstream failure that was absorbed instead of propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    /// Stage that absorbed the failure.
    pub stage: DegradedStage,
    /// What the failing call was about (a query or a URL).
    pub subject: String,
    /// Error message.
    pub error: String,
}

impl Degradation {
    /// Creates a new degradation record.
    #[must_use]
    pub fn new(stage: DegradedStage, subject: impl Into<String>, error: impl ToString) -> Self {
        Self {
            stage,
            subject: subject.into(),
            error: error.to_string(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage.to_string()));
        map.insert("subject".to_string(), serde_json::json!(self.subject));
        map.insert("error".to_string(), serde_json::json!(self.error));
        map
    }
}

/// Convenience alias for fallible searchflow operations.
pub type Result<T, E = SearchflowError> = std::result::Result<T, E>;
