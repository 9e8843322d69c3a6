//! In-memory capability implementations for tests and benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{RawEntity, SearchHit};
use crate::errors::{ExtractionError, FetchError, GenerationError, SearchError};
use crate::providers::{EntityExtractor, LanguageModel, PageFetcher, SearchProvider};

/// A search provider answering from a fixed table keyed by query text.
///
/// Unknown queries return no hits.
#[derive(Debug, Default)]
pub struct StaticSearchProvider {
    responses: HashMap<String, Result<Vec<SearchHit>, SearchError>>,
    latency: Duration,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticSearchProvider {
    /// Creates a provider with no canned responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `query` with `hits`.
    #[must_use]
    pub fn with_hits(mut self, query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.responses.insert(query.into(), Ok(hits));
        self
    }

    /// Fails `query` with `error`.
    #[must_use]
    pub fn with_error(mut self, query: impl Into<String>, error: SearchError) -> Self {
        self.responses.insert(query.into(), Err(error));
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns `(query, max_results)` for every call, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.lock().push((query.to_string(), max_results));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.responses.get(query) {
            Some(Ok(hits)) => Ok(hits.iter().take(max_results).cloned().collect()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }
}

/// A page fetcher answering from a fixed table keyed by URL.
///
/// Unknown URLs fail with HTTP 404. Tracks the peak number of concurrent
/// fetches and the order in which fetches finished.
#[derive(Debug, Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    latencies: HashMap<String, Duration>,
    default_latency: Duration,
    calls: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticPageFetcher {
    /// Creates a fetcher with no pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `text` for `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(text.into()));
        self
    }

    /// Fails `url` with `error`.
    #[must_use]
    pub fn with_error(mut self, url: impl Into<String>, error: FetchError) -> Self {
        self.pages.insert(url.into(), Err(error));
        self
    }

    /// Delays the answer for one URL.
    #[must_use]
    pub fn with_latency_for(mut self, url: impl Into<String>, latency: Duration) -> Self {
        self.latencies.insert(url.into(), latency);
        self
    }

    /// Delays every answer without a specific latency.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Returns fetched URLs in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns URLs in the order their fetches finished.
    #[must_use]
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    /// Returns the highest number of fetches observed in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even when the fetch future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let latency = self
            .latencies
            .get(url)
            .copied()
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.completed.lock().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}

/// A language model answering from scripted rules.
///
/// A prompt containing a rule's marker gets that rule's answer; otherwise
/// queued answers are used in order. With neither, the call fails.
#[derive(Debug, Default)]
pub struct ScriptedLanguageModel {
    rules: Vec<(String, Result<String, GenerationError>)>,
    queue: Mutex<VecDeque<Result<String, GenerationError>>>,
    latency: Duration,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLanguageModel {
    /// Creates a model with no scripted answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers any prompt containing `marker` with `response`.
    #[must_use]
    pub fn when_prompt_contains(
        mut self,
        marker: impl Into<String>,
        response: Result<String, GenerationError>,
    ) -> Self {
        self.rules.push((marker.into(), response));
        self
    }

    /// Queues an answer for the next unmatched prompt.
    #[must_use]
    pub fn then_respond(self, response: Result<String, GenerationError>) -> Self {
        self.queue.lock().push_back(response);
        self
    }

    /// Delays every answer.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns every prompt received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().push(prompt.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some((_, response)) = self.rules.iter().find(|(m, _)| prompt.contains(m.as_str())) {
            return response.clone();
        }
        self.queue.lock().pop_front().unwrap_or_else(|| {
            Err(GenerationError::InvalidResponse(
                "no scripted response".to_string(),
            ))
        })
    }
}

/// An entity extractor answering by text marker.
///
/// Text containing a registered marker yields that marker's entities;
/// anything else yields none.
#[derive(Debug, Default)]
pub struct StaticEntityExtractor {
    entities: Vec<(String, Result<Vec<RawEntity>, ExtractionError>)>,
    calls: Mutex<Vec<String>>,
}

impl StaticEntityExtractor {
    /// Creates an extractor that finds nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `entities` for text containing `marker`.
    #[must_use]
    pub fn with_entities(mut self, marker: impl Into<String>, entities: Vec<RawEntity>) -> Self {
        self.entities.push((marker.into(), Ok(entities)));
        self
    }

    /// Fails for text containing `marker`.
    #[must_use]
    pub fn with_error(mut self, marker: impl Into<String>, error: ExtractionError) -> Self {
        self.entities.push((marker.into(), Err(error)));
        self
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl EntityExtractor for StaticEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, ExtractionError> {
        self.calls.lock().push(text.to_string());
        self.entities
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map_or_else(|| Ok(Vec::new()), |(_, result)| result.clone())
    }
}
