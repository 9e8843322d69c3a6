//! Search fan-out and URL deduplication.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::StageResult;
use crate::core::{ExpandedQuerySet, ResultSet};
use crate::errors::{Degradation, DegradedStage, SearchError};
use crate::pipeline::{with_retry, RetryConfig};
use crate::providers::SearchProvider;

/// Runs every query against the search provider and merges the hits.
pub struct ResultAggregator {
    provider: Arc<dyn SearchProvider>,
    retry: RetryConfig,
}

impl ResultAggregator {
    /// Creates an aggregator with no retries.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the retry policy for search calls.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Searches the queries in order and keeps the first occurrence of each
    /// normalized URL, up to `max_total_results`.
    ///
    /// Queries left once the total is reached are not searched. A failing
    /// query counts as zero results.
    pub async fn aggregate(
        &self,
        queries: &ExpandedQuerySet,
        max_results_per_query: usize,
        max_total_results: usize,
    ) -> StageResult<ResultSet> {
        let mut results = ResultSet::new();
        let mut degradations = Vec::new();

        for query in queries {
            if results.len() >= max_total_results {
                debug!(query = %query, "Result limit reached, skipping query");
                break;
            }

            let hits = match with_retry(&self.retry, query, SearchError::is_transient, || {
                self.provider.search(query, max_results_per_query)
            })
            .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(
                        query = %query,
                        error = %e,
                        "Search failed, continuing without its results"
                    );
                    degradations.push(Degradation::new(DegradedStage::Search, query.as_str(), e));
                    continue;
                }
            };

            let mut added = 0;
            for hit in hits.into_iter().take(max_results_per_query) {
                if results.len() >= max_total_results {
                    break;
                }
                if results.insert(hit, query) {
                    added += 1;
                }
            }
            debug!(query = %query, added, total = results.len(), "Merged search hits");
        }

        info!(
            queries = queries.len(),
            results = results.len(),
            failed = degradations.len(),
            "Aggregated search results"
        );
        StageResult::degraded(results, degradations)
    }
}

impl std::fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultAggregator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Query, SearchHit};
    use crate::providers::MockSearchProvider;
    use crate::testing::{
        graphene_fixture, hit, StaticSearchProvider, GRAPHENE_EXPANSION, GRAPHENE_QUERY,
    };
    use pretty_assertions::assert_eq;

    fn queries(items: &[&str]) -> ExpandedQuerySet {
        let mut set = ExpandedQuerySet::new(&Query::new(items[0]).unwrap(), items.len());
        for item in &items[1..] {
            set.try_push(item);
        }
        set
    }

    fn urls(results: &ResultSet) -> Vec<&str> {
        results.iter().map(|r| r.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_graphene_duplicates_dropped_in_first_seen_order() {
        let fixture = graphene_fixture();
        let aggregator = ResultAggregator::new(fixture.search.clone());

        let result = aggregator
            .aggregate(&queries(&[GRAPHENE_QUERY, GRAPHENE_EXPANSION]), 5, 10)
            .await;

        assert_eq!(result.value.len(), 3);
        assert_eq!(urls(&result.value), fixture.expected_urls);
        assert!(result.value.iter().all(|r| r.source_query == GRAPHENE_QUERY));
        assert_eq!(fixture.search.call_count(), 2);
    }

    #[tokio::test]
    async fn test_total_limit_stops_searching() {
        let provider = Arc::new(
            StaticSearchProvider::new()
                .with_hits("a", vec![hit("https://1.example"), hit("https://2.example")])
                .with_hits("b", vec![hit("https://3.example")]),
        );
        let aggregator = ResultAggregator::new(provider.clone());

        let result = aggregator.aggregate(&queries(&["a", "b"]), 5, 2).await;

        assert_eq!(urls(&result.value), ["https://1.example", "https://2.example"]);
        assert_eq!(provider.calls(), vec![("a".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_zero_total_never_calls_provider() {
        let mut provider = MockSearchProvider::new();
        provider.expect_search().never();
        let aggregator = ResultAggregator::new(Arc::new(provider));

        let result = aggregator.aggregate(&queries(&["a", "b"]), 5, 0).await;
        assert!(result.value.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_provider_answer_truncated_per_query() {
        let mut provider = MockSearchProvider::new();
        provider.expect_search().returning(|_, _| {
            Ok((0..8)
                .map(|i| SearchHit::new("t", format!("https://{i}.example"), ""))
                .collect())
        });
        let aggregator = ResultAggregator::new(Arc::new(provider));

        let result = aggregator.aggregate(&queries(&["a"]), 3, 10).await;
        assert_eq!(result.value.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_query_is_degradation() {
        let provider = Arc::new(
            StaticSearchProvider::new()
                .with_error("a", SearchError::Quota("daily limit".into()))
                .with_hits("b", vec![hit("https://b.example")]),
        );
        let aggregator = ResultAggregator::new(provider);

        let result = aggregator.aggregate(&queries(&["a", "b"]), 5, 10).await;

        assert_eq!(urls(&result.value), ["https://b.example"]);
        assert_eq!(result.degradations.len(), 1);
        assert_eq!(result.degradations[0].stage, DegradedStage::Search);
        assert_eq!(result.degradations[0].subject, "a");
    }

    #[tokio::test]
    async fn test_all_queries_failing_is_empty_not_error() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .times(2)
            .returning(|_, _| Err(SearchError::Transient("503".into())));
        let aggregator = ResultAggregator::new(Arc::new(provider));

        let result = aggregator.aggregate(&queries(&["a", "b"]), 5, 10).await;
        assert!(result.value.is_empty());
        assert_eq!(result.degradations.len(), 2);
    }

    #[tokio::test]
    async fn test_auth_error_never_retried() {
        let mut provider = MockSearchProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_, _| Err(SearchError::Auth("bad key".into())));
        let aggregator = ResultAggregator::new(Arc::new(provider))
            .with_retry(RetryConfig::new().with_max_attempts(3).with_base_delay_ms(1));

        let result = aggregator.aggregate(&queries(&["a"]), 5, 10).await;
        assert_eq!(result.degradations.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_error_retried() {
        let mut provider = MockSearchProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(SearchError::Transient("503".into())));
        provider
            .expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![SearchHit::new("t", "https://a.example", "")]));
        let aggregator = ResultAggregator::new(Arc::new(provider))
            .with_retry(RetryConfig::new().with_max_attempts(2).with_base_delay_ms(1));

        let result = aggregator.aggregate(&queries(&["a"]), 5, 10).await;
        assert_eq!(result.value.len(), 1);
        assert!(!result.is_degraded());
    }
}
