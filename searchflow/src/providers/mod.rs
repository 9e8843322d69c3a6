//! Capability traits for the external collaborators.
//!
//! The pipeline only talks to the outside world through these four traits,
//! so every stage can be exercised with in-memory fakes. HTTP-backed
//! implementations live behind the `http` feature.

use async_trait::async_trait;

#[cfg(feature = "http")]
use crate::config::FetchSettings;
use crate::core::{RawEntity, SearchHit};
use crate::errors::{ExtractionError, FetchError, GenerationError, SearchError};
#[cfg(feature = "http")]
use crate::errors::{Result, SearchflowError};

mod llm_entities;

#[cfg(feature = "http")]
mod google;
#[cfg(feature = "http")]
mod http_fetcher;
#[cfg(feature = "http")]
mod openai;

pub use llm_entities::LlmEntityExtractor;

#[cfg(feature = "http")]
pub use google::GoogleSearchProvider;
#[cfg(feature = "http")]
pub use http_fetcher::{extract_readable_text, HttpPageFetcher};
#[cfg(feature = "http")]
pub use openai::OpenAiLanguageModel;

/// Redirects followed before a fetch gives up.
#[cfg(feature = "http")]
const MAX_REDIRECTS: usize = 5;

/// Builds the HTTP client shared by the HTTP adapters.
///
/// The client carries the user agent and redirect policy only. Each adapter
/// applies its own timeout per request.
#[cfg(feature = "http")]
pub fn build_http_client(settings: &FetchSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| SearchflowError::config(format!("failed to build HTTP client: {e}")))
}

/// Protocol for web search.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Searches for `query`, returning at most `max_results` hits in rank order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Protocol for fetching a page and extracting its readable text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns its body text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Protocol for named-entity recognition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extracts the named entities mentioned in `text`.
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, ExtractionError>;
}

/// Protocol for text generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
