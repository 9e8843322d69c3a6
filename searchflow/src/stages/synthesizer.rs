//! Overview generation from the collected sources.

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Limits;
use crate::core::{Entity, ExtractedDocument, Link, Overview, Query};
use crate::errors::{GenerationError, Result, SearchflowError};
use crate::pipeline::{with_retry, RetryConfig};
use crate::prompts::Prompts;
use crate::providers::LanguageModel;
use crate::utils::truncate_chars;

/// Writes the final overview with a single language-model call.
pub struct OverviewSynthesizer {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
    retry: RetryConfig,
    max_chars_per_document: usize,
    max_total_chars: usize,
    max_prompt_entities: usize,
}

impl OverviewSynthesizer {
    /// Creates a synthesizer with the default limits and prompts.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let limits = Limits::default();
        Self {
            model,
            prompts: Arc::new(Prompts::default()),
            retry: RetryConfig::default(),
            max_chars_per_document: limits.max_chars_per_document,
            max_total_chars: limits.max_total_chars,
            max_prompt_entities: limits.max_prompt_entities,
        }
    }

    /// Takes the prompt-size limits from `limits`.
    #[must_use]
    pub fn with_limits(mut self, limits: &Limits) -> Self {
        self.max_chars_per_document = limits.max_chars_per_document;
        self.max_total_chars = limits.max_total_chars;
        self.max_prompt_entities = limits.max_prompt_entities;
        self
    }

    /// Uses shared prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: Arc<Prompts>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Sets the retry policy for the model call.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Produces the overview for `query`.
    ///
    /// Without a usable document the fixed "no sources" overview is
    /// returned and the model is not called. A failing model call fails
    /// the synthesis.
    pub async fn synthesize(
        &self,
        query: &Query,
        documents: &[ExtractedDocument],
        entities: Vec<Entity>,
    ) -> Result<Overview> {
        let usable: Vec<&ExtractedDocument> = documents.iter().filter(|d| d.is_ok()).collect();
        if usable.is_empty() {
            info!(query = %query, "No usable sources, returning empty overview");
            return Ok(Overview::no_sources(query.as_str()));
        }

        let prompt = self.render_prompt(query, &usable, &entities);
        debug!(
            sources = usable.len(),
            prompt_chars = prompt.chars().count(),
            "Synthesizing overview"
        );

        let summary_text =
            with_retry(&self.retry, query.as_str(), GenerationError::is_transient, || {
                self.model.generate(&prompt)
            })
            .await
            .map_err(SearchflowError::Synthesis)?;

        let links = usable
            .iter()
            .map(|d| Link {
                url: d.url.clone(),
                title: d.title.clone(),
            })
            .collect();

        info!(sources = usable.len(), chars = summary_text.len(), "Synthesized overview");
        Ok(Overview {
            query: query.as_str().to_string(),
            summary_text,
            links,
            entities,
        })
    }

    fn render_prompt(
        &self,
        query: &Query,
        sources: &[&ExtractedDocument],
        entities: &[Entity],
    ) -> String {
        let sources = self.sources_block(sources);
        let entities = self.entities_block(entities);
        self.prompts.render_synthesis(query.as_str(), &sources, &entities)
    }

    /// Numbered source blocks. Every source keeps its number so citations
    /// line up with the links, even once the character budget runs out.
    fn sources_block(&self, sources: &[&ExtractedDocument]) -> String {
        let mut block = String::new();
        let mut remaining = self.max_total_chars;

        for (index, document) in sources.iter().enumerate() {
            let _ = writeln!(block, "[{}] {} <{}>", index + 1, document.title, document.url);
            let text = truncate_chars(&document.text, self.max_chars_per_document.min(remaining));
            remaining -= text.chars().count();
            if !text.is_empty() {
                block.push_str(text);
                block.push('\n');
            }
            block.push('\n');
        }

        block
    }

    fn entities_block(&self, entities: &[Entity]) -> String {
        if entities.is_empty() || self.max_prompt_entities == 0 {
            return String::new();
        }
        let mut block = String::from("Key entities:\n");
        for entity in entities.iter().take(self.max_prompt_entities) {
            let _ = writeln!(block, "- {} ({}, {})", entity.text, entity.label, entity.count);
        }
        block
    }
}

impl std::fmt::Debug for OverviewSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverviewSynthesizer")
            .field("max_chars_per_document", &self.max_chars_per_document)
            .field("max_total_chars", &self.max_total_chars)
            .field("max_prompt_entities", &self.max_prompt_entities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SearchResult, NO_SOURCES_SUMMARY};
    use crate::providers::MockLanguageModel;
    use crate::testing::{assert_links, assert_no_sources, ScriptedLanguageModel, SYNTHESIS_MARKER};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn source(url: &str, title: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            snippet: String::new(),
            source_query: "q".to_string(),
        }
    }

    fn query() -> Query {
        Query::new("graphene batteries").unwrap()
    }

    fn documents() -> Vec<ExtractedDocument> {
        vec![
            ExtractedDocument::fetched(&source("https://a.example", "A"), "alpha text"),
            ExtractedDocument::failed(&source("https://b.example", "B"), "HTTP status 500"),
            ExtractedDocument::fetched(&source("https://c.example", "C"), ""),
            ExtractedDocument::fetched(&source("https://d.example", "D"), "delta text"),
        ]
    }

    #[tokio::test]
    async fn test_no_usable_documents_skips_model() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().never();
        let synthesizer = OverviewSynthesizer::new(Arc::new(model));
        let documents = vec![ExtractedDocument::failed(&source("https://a.example", "A"), "boom")];

        let overview = synthesizer.synthesize(&query(), &documents, Vec::new()).await.unwrap();

        assert_no_sources(&overview);
        assert_eq!(overview.summary_text, NO_SOURCES_SUMMARY);
        assert_eq!(overview.query, "graphene batteries");
    }

    #[tokio::test]
    async fn test_response_used_verbatim_and_links_follow_usable_documents() {
        let model = Arc::new(
            ScriptedLanguageModel::new()
                .when_prompt_contains(SYNTHESIS_MARKER, Ok("  Graphene [1][2].\n".to_string())),
        );
        let synthesizer = OverviewSynthesizer::new(model.clone());
        let entities = vec![Entity {
            text: "Graphene".to_string(),
            label: "OTHER".to_string(),
            count: 2,
        }];

        let overview = synthesizer
            .synthesize(&query(), &documents(), entities.clone())
            .await
            .unwrap();

        assert_eq!(overview.summary_text, "  Graphene [1][2].\n");
        assert_links(&overview, &["https://a.example", "https://d.example"]);
        assert_eq!(overview.entities, entities);

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("[1] A <https://a.example>\nalpha text\n"));
        assert!(prompt.contains("[2] D <https://d.example>\ndelta text\n"));
        assert!(!prompt.contains("https://b.example"));
        assert!(prompt.contains("- Graphene (OTHER, 2)"));
    }

    #[tokio::test]
    async fn test_prompt_respects_character_caps() {
        let model = Arc::new(ScriptedLanguageModel::new().then_respond(Ok("ok".to_string())));
        let limits = Limits {
            max_chars_per_document: 4,
            max_total_chars: 6,
            ..Limits::default()
        };
        let synthesizer = OverviewSynthesizer::new(model.clone()).with_limits(&limits);
        let documents = vec![
            ExtractedDocument::fetched(&source("https://a.example", "A"), "ééééééé"),
            ExtractedDocument::fetched(&source("https://b.example", "B"), "bbbbbbb"),
            ExtractedDocument::fetched(&source("https://c.example", "C"), "ccccccc"),
        ];

        let overview = synthesizer.synthesize(&query(), &documents, Vec::new()).await.unwrap();

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("[1] A <https://a.example>\néééé\n"));
        assert!(prompt.contains("[2] B <https://b.example>\nbb\n"));
        assert!(prompt.contains("[3] C <https://c.example>\n\n"));
        assert!(!prompt.contains("ccc"));
        assert_eq!(overview.links.len(), 3);
    }

    #[tokio::test]
    async fn test_entity_block_limited_and_omitted_when_empty() {
        let model = Arc::new(
            ScriptedLanguageModel::new()
                .then_respond(Ok("one".to_string()))
                .then_respond(Ok("two".to_string())),
        );
        let limits = Limits {
            max_prompt_entities: 1,
            ..Limits::default()
        };
        let synthesizer = OverviewSynthesizer::new(model.clone()).with_limits(&limits);
        let entities = vec![
            Entity {
                text: "IBM".to_string(),
                label: "ORGANIZATION".to_string(),
                count: 3,
            },
            Entity {
                text: "Paris".to_string(),
                label: "LOCATION".to_string(),
                count: 1,
            },
        ];

        synthesizer.synthesize(&query(), &documents(), entities).await.unwrap();
        synthesizer.synthesize(&query(), &documents(), Vec::new()).await.unwrap();

        let prompts = model.prompts();
        assert!(prompts[0].contains("- IBM (ORGANIZATION, 3)"));
        assert!(!prompts[0].contains("Paris"));
        assert!(!prompts[1].contains("Key entities"));
    }

    #[tokio::test]
    async fn test_model_failure_is_synthesis_error() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Err(GenerationError::Timeout(Duration::from_secs(60))));
        let synthesizer = OverviewSynthesizer::new(Arc::new(model));

        let err = synthesizer
            .synthesize(&query(), &documents(), Vec::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "SynthesisFailure");
        assert!(matches!(err, SearchflowError::Synthesis(GenerationError::Timeout(_))));
    }
}
