//! Concurrent page fetching.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::StageResult;
use crate::core::{ExtractedDocument, ResultSet, SearchResult};
use crate::errors::{Degradation, DegradedStage, FetchError};
use crate::pipeline::{with_retry, RetryConfig};
use crate::providers::PageFetcher;

/// Fetches the text behind every search result.
///
/// Fetches run concurrently, at most `max_concurrency` at a time. The
/// output has one document per result, in result order, however the
/// fetches happen to finish.
pub struct ContentCollector {
    fetcher: Arc<dyn PageFetcher>,
    max_concurrency: usize,
    retry: RetryConfig,
}

impl ContentCollector {
    /// Creates a collector; a concurrency of zero is raised to one.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the retry policy for fetches.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the effective concurrency limit.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Fetches every result, giving each fetch `timeout_per_fetch`.
    ///
    /// Failed and timed-out fetches become `fetch_failed` documents and are
    /// recorded as degradations.
    pub async fn collect(
        &self,
        results: &ResultSet,
        timeout_per_fetch: Duration,
    ) -> StageResult<Vec<ExtractedDocument>> {
        let mut slots: Vec<Option<ExtractedDocument>> = vec![None; results.len()];

        let mut completions = stream::iter(results.iter().enumerate())
            .map(|(index, result)| async move {
                (index, self.fetch_one(result, timeout_per_fetch).await)
            })
            .buffer_unordered(self.max_concurrency);

        while let Some((index, document)) = completions.next().await {
            slots[index] = Some(document);
        }
        drop(completions);

        let mut degradations = Vec::new();
        let documents: Vec<ExtractedDocument> = slots
            .into_iter()
            .zip(results.iter())
            .map(|(slot, result)| {
                slot.unwrap_or_else(|| ExtractedDocument::failed(result, "fetch did not complete"))
            })
            .inspect(|doc| {
                if let Some(error) = &doc.error {
                    let url = doc.url.as_str();
                    degradations.push(Degradation::new(DegradedStage::Fetch, url, error));
                }
            })
            .collect();

        info!(
            documents = documents.len(),
            ok = documents.iter().filter(|d| d.is_ok()).count(),
            failed = degradations.len(),
            "Collected page content"
        );
        StageResult::degraded(documents, degradations)
    }

    async fn fetch_one(&self, result: &SearchResult, timeout: Duration) -> ExtractedDocument {
        let url = result.url.as_str();
        let fetched = with_retry(&self.retry, url, FetchError::is_transient, || async move {
            tokio::time::timeout(timeout, self.fetcher.fetch(url))
                .await
                .unwrap_or(Err(FetchError::Timeout(timeout)))
        })
        .await;

        match fetched {
            Ok(text) => {
                let document = ExtractedDocument::fetched(result, text);
                debug!(
                    url,
                    status = %document.status,
                    chars = document.text.len(),
                    "Fetched document"
                );
                document
            }
            Err(e) => {
                warn!(url, error = %e, "Fetch failed");
                ExtractedDocument::failed(result, e)
            }
        }
    }
}

impl std::fmt::Debug for ContentCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCollector")
            .field("max_concurrency", &self.max_concurrency)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
