//! Google Custom Search JSON API provider.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{build_http_client, SearchProvider};
use crate::config::{FetchSettings, SearchSettings};
use crate::core::SearchHit;
use crate::errors::{Result, SearchError, SearchflowError};

/// The API never returns more than ten results per request.
const MAX_RESULTS_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Web search through the Google Custom Search JSON API.
#[derive(Clone)]
pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    engine_id: String,
    endpoint: String,
    timeout: Duration,
}

impl GoogleSearchProvider {
    /// Creates a provider from settings.
    ///
    /// Fails if the API key or engine id is missing.
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let client = build_http_client(&FetchSettings::default())?;
        Self::with_client(client, settings)
    }

    /// Creates a provider sharing an existing client.
    pub fn with_client(client: Client, settings: &SearchSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| SearchflowError::config("search API key is not set (GOOGLE_API_KEY)"))?;
        let engine_id = settings
            .engine_id
            .clone()
            .ok_or_else(|| SearchflowError::config("search engine id is not set (GOOGLE_CSE_ID)"))?;

        Ok(Self {
            client,
            api_key,
            engine_id,
            endpoint: settings.endpoint.clone(),
            timeout: settings.timeout(),
        })
    }
}

impl std::fmt::Debug for GoogleSearchProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchProvider")
            .field("engine_id", &self.engine_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let num = max_results.min(MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.timeout)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Transient(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Transient(e.without_url().to_string()))?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        debug!(query, hits = parsed.items.len(), "Search answered");
        Ok(parsed
            .items
            .into_iter()
            .take(max_results)
            .map(|item| SearchHit::new(item.title, item.link, item.snippet))
            .collect())
    }
}

/// Maps a non-success response to a search error.
///
/// The API reports daily quota exhaustion as 403 with a `rateLimitExceeded`
/// or `dailyLimitExceeded` reason, so the body is checked before the code.
fn classify_status(status: StatusCode, body: &str) -> SearchError {
    let message = format!("HTTP {}", status.as_u16());
    if status == StatusCode::TOO_MANY_REQUESTS
        || body.contains("rateLimitExceeded")
        || body.contains("dailyLimitExceeded")
    {
        SearchError::Quota(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        SearchError::Auth(message)
    } else {
        SearchError::Transient(message)
    }
}
