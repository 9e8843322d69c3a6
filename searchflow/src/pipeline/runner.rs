//! Pipeline assembly and execution.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug_span, error, info, info_span, Instrument};
use uuid::Uuid;

use super::report::{DocumentStats, RunReport, StageTiming};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{Overview, Query, StageName};
use crate::errors::{Degradation, Result, SearchflowError};
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::{RunEvents, SpanTimer};
use crate::prompts::Prompts;
use crate::providers::{EntityExtractor, LanguageModel, PageFetcher, SearchProvider};
use crate::stages::{
    ContentCollector, EntityAnnotator, OverviewSynthesizer, QueryExpander, ResultAggregator,
    StageResult,
};

/// The assembled query-to-overview pipeline.
///
/// A pipeline is immutable once built and holds no per-run state, so one
/// instance can serve concurrent runs.
///
/// # Example
///
/// ```
/// use searchflow::pipeline::Pipeline;
/// use searchflow::testing::graphene_fixture;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fixture = graphene_fixture();
/// let pipeline = Pipeline::builder()
///     .search_provider(fixture.search.clone())
///     .page_fetcher(fixture.fetcher.clone())
///     .language_model(fixture.model.clone())
///     .build()
///     .unwrap();
///
/// let overview = pipeline.run("graphene batteries").await.unwrap();
/// assert_eq!(overview.links.len(), 3);
/// # }
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    expander: QueryExpander,
    aggregator: ResultAggregator,
    collector: ContentCollector,
    annotator: Option<EntityAnnotator>,
    synthesizer: OverviewSynthesizer,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Starts assembling a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the configuration the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns true if the entity annotation stage runs.
    #[must_use]
    pub fn entities_enabled(&self) -> bool {
        self.annotator.is_some()
    }

    /// Produces the overview for `query`.
    pub async fn run(&self, query: &str) -> Result<Overview> {
        self.run_with_report(query).await.map(|report| report.overview)
    }

    /// Produces the overview for `query` along with the run statistics.
    pub async fn run_with_report(&self, query: &str) -> Result<RunReport> {
        self.execute(query, None).await
    }

    /// Like [`run_with_report`](Self::run_with_report), but stops with
    /// [`SearchflowError::Cancelled`] as soon as `token` is cancelled.
    ///
    /// In-flight upstream calls are dropped; no further stage starts.
    pub async fn run_cancellable(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<RunReport> {
        self.execute(query, Some(token)).await
    }

    async fn execute(&self, query: &str, token: Option<&CancellationToken>) -> Result<RunReport> {
        let run_id = Uuid::now_v7();
        let searched_on = Utc::now();
        let events = RunEvents::new(Arc::clone(&self.sink), run_id);
        let span = info_span!("pipeline.run", %run_id);

        async {
            let timer = SpanTimer::start("pipeline.run");
            events.pipeline_started(query);

            let stages = self.run_stages(query, searched_on, &events);
            let bounded = async {
                match self.config.run_timeout() {
                    Some(limit) => tokio::time::timeout(limit, stages)
                        .await
                        .unwrap_or(Err(SearchflowError::Timeout(limit))),
                    None => stages.await,
                }
            };
            let outcome = match token {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => Err(SearchflowError::Cancelled(
                        token.reason().unwrap_or_else(|| "cancelled".to_string()),
                    )),
                    outcome = bounded => outcome,
                },
                None => bounded.await,
            };

            let duration_ms = timer.elapsed_ms();
            match &outcome {
                Ok(report) => {
                    events.pipeline_completed(
                        duration_ms,
                        report.degradations.len(),
                        report.overview.links.len(),
                    );
                    info!(
                        duration_ms,
                        links = report.overview.links.len(),
                        degradations = report.degradations.len(),
                        "Pipeline run completed"
                    );
                }
                Err(e) => {
                    events.pipeline_failed(e, duration_ms);
                    error!(error = %e, kind = e.kind(), duration_ms, "Pipeline run failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        raw_query: &str,
        searched_on: DateTime<Utc>,
        events: &RunEvents,
    ) -> Result<RunReport> {
        let timer = SpanTimer::start("pipeline.stages");
        let query = Query::new(raw_query)?;
        let limits = &self.config.limits;
        let mut trace = RunTrace::new(events);

        let expanded = trace
            .stage(
                StageName::Expand,
                self.expander.expand(&query, limits.max_expansions),
                |set| json!({ "queries": set.len() }),
            )
            .await;

        let results = trace
            .stage(
                StageName::Aggregate,
                self.aggregator
                    .aggregate(&expanded, limits.max_results_per_query, limits.max_total_results),
                |results| json!({ "results": results.len() }),
            )
            .await;

        let documents = trace
            .stage(
                StageName::Collect,
                self.collector.collect(&results, limits.fetch_timeout()),
                |documents| {
                    let stats = DocumentStats::from_documents(documents);
                    json!({
                        "ok": stats.ok,
                        "empty": stats.empty,
                        "fetch_failed": stats.fetch_failed,
                    })
                },
            )
            .await;

        let entities = match &self.annotator {
            Some(annotator) => {
                trace
                    .stage(
                        StageName::Annotate,
                        annotator.annotate(&documents),
                        |entities| json!({ "entities": entities.len() }),
                    )
                    .await
            }
            None => Vec::new(),
        };
        let entity_count = entities.len();

        events.stage_started(StageName::Synthesize);
        let stage_timer = SpanTimer::start("synthesize");
        let overview = self
            .synthesizer
            .synthesize(&query, &documents, entities)
            .instrument(debug_span!("pipeline.stage", stage = %StageName::Synthesize))
            .await?;
        trace.finish_stage(
            StageName::Synthesize,
            stage_timer.elapsed_ms(),
            json!({
                "links": overview.links.len(),
                "chars": overview.summary_text.chars().count(),
            }),
        );

        let RunTrace { timings, degradations, .. } = trace;
        Ok(RunReport {
            run_id: events.run_id(),
            searched_on,
            query: query.as_str().to_string(),
            expanded_queries: expanded.into_vec(),
            result_count: results.len(),
            documents: DocumentStats::from_documents(&documents),
            entity_count,
            stage_timings: timings,
            degradations,
            duration_ms: timer.elapsed_ms(),
            overview,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("entities_enabled", &self.entities_enabled())
            .finish_non_exhaustive()
    }
}

/// Per-run bookkeeping of stage timings and absorbed failures.
struct RunTrace<'a> {
    events: &'a RunEvents,
    timings: Vec<StageTiming>,
    degradations: Vec<Degradation>,
}

impl<'a> RunTrace<'a> {
    fn new(events: &'a RunEvents) -> Self {
        Self {
            events,
            timings: Vec::new(),
            degradations: Vec::new(),
        }
    }

    async fn stage<T, Fut, S>(&mut self, stage: StageName, run: Fut, summary: S) -> T
    where
        Fut: Future<Output = StageResult<T>>,
        S: FnOnce(&T) -> Value,
    {
        self.events.stage_started(stage);
        let timer = SpanTimer::start("stage");
        let (value, degradations) = run
            .instrument(debug_span!("pipeline.stage", stage = %stage))
            .await
            .into_parts();

        for degradation in &degradations {
            self.events.stage_degraded(stage, degradation);
        }
        self.degradations.extend(degradations);
        self.finish_stage(stage, timer.elapsed_ms(), summary(&value));
        value
    }

    fn finish_stage(&mut self, stage: StageName, duration_ms: f64, extra: Value) {
        self.events.stage_completed(stage, duration_ms, extra);
        self.timings.push(StageTiming { stage, duration_ms });
    }
}

/// Assembles a [`Pipeline`] from its capabilities and configuration.
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    prompts: Prompts,
    search: Option<Arc<dyn SearchProvider>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    model: Option<Arc<dyn LanguageModel>>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Creates a builder with default configuration and prompts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the prompt templates.
    #[must_use]
    pub fn prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Sets the search provider.
    #[must_use]
    pub fn search_provider(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Sets the page fetcher.
    #[must_use]
    pub fn page_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the language model used for expansion and synthesis.
    #[must_use]
    pub fn language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the entity extractor. Only used when entities are enabled.
    #[must_use]
    pub fn entity_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fills every unset capability with its HTTP implementation.
    ///
    /// All adapters share one connection pool; each applies its own timeout
    /// per request. The entity extractor is only created when entities are
    /// enabled and asks the same language model.
    #[cfg(feature = "http")]
    pub fn with_http_adapters(mut self) -> Result<Self> {
        use crate::providers::{
            build_http_client, GoogleSearchProvider, HttpPageFetcher, LlmEntityExtractor,
            OpenAiLanguageModel,
        };

        let client = build_http_client(&self.config.fetch)?;
        if self.search.is_none() {
            let provider = GoogleSearchProvider::with_client(client.clone(), &self.config.search)?;
            self.search = Some(Arc::new(provider));
        }
        if self.fetcher.is_none() {
            let fetcher = HttpPageFetcher::with_client(
                client.clone(),
                &self.config.fetch,
                self.config.limits.fetch_timeout(),
            );
            self.fetcher = Some(Arc::new(fetcher));
        }
        let model = match &self.model {
            Some(model) => Arc::clone(model),
            None => {
                let model: Arc<dyn LanguageModel> =
                    Arc::new(OpenAiLanguageModel::with_client(client, &self.config.model)?);
                self.model = Some(Arc::clone(&model));
                model
            }
        };
        if self.config.entities_enabled && self.extractor.is_none() {
            let extractor = LlmEntityExtractor::new(model).with_prompts(self.prompts.clone());
            self.extractor = Some(Arc::new(extractor));
        }
        Ok(self)
    }

    /// Validates the configuration and assembles the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        self.prompts.validate()?;

        let search = self
            .search
            .ok_or_else(|| SearchflowError::config("a search provider is required"))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| SearchflowError::config("a page fetcher is required"))?;
        let model = self
            .model
            .ok_or_else(|| SearchflowError::config("a language model is required"))?;

        let annotator = if self.config.entities_enabled {
            let extractor = self.extractor.ok_or_else(|| {
                SearchflowError::config("entities are enabled but no entity extractor is set")
            })?;
            Some(EntityAnnotator::new(extractor))
        } else {
            None
        };

        let config = self.config;
        let prompts = Arc::new(self.prompts);
        let retry = config.retry.clone();

        Ok(Pipeline {
            expander: QueryExpander::new(Arc::clone(&model))
                .with_prompts(Arc::clone(&prompts))
                .with_retry(retry.clone()),
            aggregator: ResultAggregator::new(search).with_retry(retry.clone()),
            collector: ContentCollector::new(fetcher, config.limits.max_fetch_concurrency)
                .with_retry(retry.clone()),
            annotator,
            synthesizer: OverviewSynthesizer::new(model)
                .with_prompts(prompts)
                .with_limits(&config.limits)
                .with_retry(retry),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            config,
        })
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("search", &self.search.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("model", &self.model.is_some())
            .field("extractor", &self.extractor.is_some())
            .finish_non_exhaustive()
    }
}
