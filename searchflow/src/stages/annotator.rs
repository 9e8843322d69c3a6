//! Named-entity annotation across collected documents.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::StageResult;
use crate::core::{Entity, ExtractedDocument};
use crate::errors::{Degradation, DegradedStage};
use crate::providers::EntityExtractor;
use crate::utils::fold_key;

/// Extracts and merges the entities mentioned in the usable documents.
pub struct EntityAnnotator {
    extractor: Arc<dyn EntityExtractor>,
}

impl EntityAnnotator {
    /// Creates an annotator.
    #[must_use]
    pub fn new(extractor: Arc<dyn EntityExtractor>) -> Self {
        Self { extractor }
    }

    /// Returns merged entities, most frequent first.
    ///
    /// Entities are merged on trimmed, case-folded text plus label; the
    /// first surface form seen is kept. Ties keep first-seen order.
    pub async fn annotate(&self, documents: &[ExtractedDocument]) -> StageResult<Vec<Entity>> {
        let mut merged: Vec<Entity> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut degradations = Vec::new();

        for document in documents.iter().filter(|d| d.is_ok()) {
            let raw = match self.extractor.extract(&document.text).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(url = %document.url, error = %e, "Entity extraction failed");
                    degradations.push(Degradation::new(
                        DegradedStage::Entities,
                        document.url.as_str(),
                        e,
                    ));
                    continue;
                }
            };
            debug!(url = %document.url, entities = raw.len(), "Extracted entities");

            for entity in raw {
                let text = entity.text.trim();
                if text.is_empty() {
                    continue;
                }
                let key = (fold_key(text), entity.label.clone());
                if let Some(&position) = index.get(&key) {
                    merged[position].count += 1;
                } else {
                    index.insert(key, merged.len());
                    merged.push(Entity {
                        text: text.to_string(),
                        label: entity.label,
                        count: 1,
                    });
                }
            }
        }

        // stable sort keeps first-seen order among equal counts
        merged.sort_by(|a, b| b.count.cmp(&a.count));

        info!(entities = merged.len(), failed = degradations.len(), "Annotated documents");
        StageResult::degraded(merged, degradations)
    }
}

impl std::fmt::Debug for EntityAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAnnotator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawEntity, SearchResult};
    use crate::errors::ExtractionError;
    use crate::providers::MockEntityExtractor;
    use crate::testing::StaticEntityExtractor;
    use pretty_assertions::assert_eq;

    fn source(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: String::new(),
            snippet: String::new(),
            source_query: "q".to_string(),
        }
    }

    fn entity(text: &str, label: &str, count: usize) -> Entity {
        Entity {
            text: text.to_string(),
            label: label.to_string(),
            count,
        }
    }

    #[tokio::test]
    async fn test_merges_by_folded_text_and_label() {
        let extractor = StaticEntityExtractor::new()
            .with_entities(
                "first",
                vec![
                    RawEntity::new("Paris", "LOCATION"),
                    RawEntity::new("Marie Curie", "PERSON"),
                    RawEntity::new("   ", "PERSON"),
                ],
            )
            .with_entities(
                "second",
                vec![
                    RawEntity::new(" marie curie ", "PERSON"),
                    RawEntity::new("Paris", "ORGANIZATION"),
                    RawEntity::new("MARIE CURIE", "PERSON"),
                ],
            );
        let annotator = EntityAnnotator::new(Arc::new(extractor));
        let documents = vec![
            ExtractedDocument::fetched(&source("https://a.example"), "first doc"),
            ExtractedDocument::fetched(&source("https://b.example"), "second doc"),
        ];

        let result = annotator.annotate(&documents).await;

        assert_eq!(
            result.value,
            vec![
                entity("Marie Curie", "PERSON", 3),
                entity("Paris", "LOCATION", 1),
                entity("Paris", "ORGANIZATION", 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_unusable_documents() {
        let mut extractor = MockEntityExtractor::new();
        extractor
            .expect_extract()
            .times(1)
            .returning(|_| Ok(vec![RawEntity::new("Graphene", "OTHER")]));
        let annotator = EntityAnnotator::new(Arc::new(extractor));
        let documents = vec![
            ExtractedDocument::failed(&source("https://a.example"), "HTTP status 500"),
            ExtractedDocument::fetched(&source("https://b.example"), "  "),
            ExtractedDocument::fetched(&source("https://c.example"), "graphene"),
        ];

        let result = annotator.annotate(&documents).await;
        assert_eq!(result.value, vec![entity("Graphene", "OTHER", 1)]);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_absorbed() {
        let extractor = StaticEntityExtractor::new()
            .with_error("broken", ExtractionError::Unavailable("model down".into()))
            .with_entities("fine", vec![RawEntity::new("IBM", "ORGANIZATION")]);
        let annotator = EntityAnnotator::new(Arc::new(extractor));
        let documents = vec![
            ExtractedDocument::fetched(&source("https://a.example"), "broken page"),
            ExtractedDocument::fetched(&source("https://b.example"), "fine page"),
        ];

        let result = annotator.annotate(&documents).await;

        assert_eq!(result.value, vec![entity("IBM", "ORGANIZATION", 1)]);
        assert_eq!(result.degradations.len(), 1);
        assert_eq!(result.degradations[0].stage, DegradedStage::Entities);
        assert_eq!(result.degradations[0].subject, "https://a.example");
    }

    #[tokio::test]
    async fn test_ties_keep_first_seen_order() {
        let extractor = StaticEntityExtractor::new().with_entities(
            "doc",
            vec![
                RawEntity::new("Zeta", "OTHER"),
                RawEntity::new("Alpha", "OTHER"),
                RawEntity::new("Beta", "OTHER"),
                RawEntity::new("Beta", "OTHER"),
            ],
        );
        let annotator = EntityAnnotator::new(Arc::new(extractor));
        let documents = vec![ExtractedDocument::fetched(&source("https://a.example"), "doc")];

        let result = annotator.annotate(&documents).await;
        let names: Vec<&str> = result.value.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(names, ["Beta", "Zeta", "Alpha"]);
    }
}
