//! Entity extraction backed by a language model.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{EntityExtractor, LanguageModel};
use crate::core::RawEntity;
use crate::errors::ExtractionError;
use crate::prompts::Prompts;
use crate::utils::truncate_chars;

/// Labels the extractor reports; anything else is mapped to `OTHER`.
const LABELS: &[&str] = &["PERSON", "ORGANIZATION", "LOCATION", "DATE", "OTHER"];

const DEFAULT_MAX_INPUT_CHARS: usize = 8_000;

#[derive(Debug, Deserialize)]
struct EntityRecord {
    text: String,
    #[serde(default, alias = "type")]
    label: Option<String>,
}

/// Asks a [`LanguageModel`] to list the named entities in a text.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use searchflow::providers::{EntityExtractor, LanguageModel, LlmEntityExtractor};
/// # async fn demo(model: Arc<dyn LanguageModel>) {
/// let extractor = LlmEntityExtractor::new(model);
/// let entities = extractor.extract("Marie Curie worked in Paris.").await;
/// # }
/// ```
pub struct LlmEntityExtractor {
    model: Arc<dyn LanguageModel>,
    prompts: Prompts,
    max_input_chars: usize,
}

impl LlmEntityExtractor {
    /// Creates an extractor using the default entity prompt.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            prompts: Prompts::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Uses custom prompt templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Caps the characters of document text sent to the model.
    #[must_use]
    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max.max(1);
        self
    }
}

impl std::fmt::Debug for LlmEntityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmEntityExtractor")
            .field("max_input_chars", &self.max_input_chars)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawEntity>, ExtractionError> {
        let prompt = self
            .prompts
            .render_entities(truncate_chars(text, self.max_input_chars));

        let response = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| ExtractionError::Unavailable(e.to_string()))?;

        let entities = parse_entities(&response)?;
        debug!(count = entities.len(), "Extracted entities");
        Ok(entities)
    }
}

/// Parses the model's answer into raw entities.
///
/// The JSON array may be wrapped in prose or a code fence. Records with a
/// blank text are skipped; labels are upper-cased and unknown ones become
/// `OTHER`.
fn parse_entities(response: &str) -> Result<Vec<RawEntity>, ExtractionError> {
    let (start, end) = match (response.find('['), response.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ExtractionError::InvalidResponse(
                "no JSON array in model output".to_string(),
            ))
        }
    };

    let records: Vec<EntityRecord> = serde_json::from_str(&response[start..=end])
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    Ok(records
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(|r| {
            let label = r
                .label
                .map(|l| l.trim().to_uppercase())
                .filter(|l| LABELS.contains(&l.as_str()))
                .unwrap_or_else(|| "OTHER".to_string());
            RawEntity::new(r.text.trim(), label)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerationError;
    use crate::providers::MockLanguageModel;
    use pretty_assertions::assert_eq;

    fn extractor_answering(answer: Result<String, GenerationError>) -> LlmEntityExtractor {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(move |_| answer.clone());
        LlmEntityExtractor::new(Arc::new(model))
    }

    #[tokio::test]
    async fn test_extracts_entities_from_plain_json() {
        let extractor = extractor_answering(Ok(
            r#"[{"text": "Marie Curie", "label": "PERSON"}, {"text": "Paris", "label": "location"}]"#
                .to_string(),
        ));

        let entities = extractor.extract("Marie Curie worked in Paris.").await.unwrap();
        assert_eq!(
            entities,
            vec![
                RawEntity::new("Marie Curie", "PERSON"),
                RawEntity::new("Paris", "LOCATION"),
            ]
        );
    }

    #[test]
    fn test_parse_tolerates_code_fence_and_prose() {
        let response = "Here are the entities:\n```json\n[{\"text\": \"IBM\", \"type\": \"ORGANIZATION\"}]\n```";
        assert_eq!(
            parse_entities(response).unwrap(),
            vec![RawEntity::new("IBM", "ORGANIZATION")]
        );
    }

    #[test]
    fn test_parse_maps_unknown_labels_and_skips_blank_text() {
        let response = r#"[{"text": "  ", "label": "PERSON"}, {"text": "Nobel Prize", "label": "AWARD"}, {"text": "1903"}]"#;
        assert_eq!(
            parse_entities(response).unwrap(),
            vec![
                RawEntity::new("Nobel Prize", "OTHER"),
                RawEntity::new("1903", "OTHER"),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_entities("I could not find any entities."),
            Err(ExtractionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_entities("[not json]"),
            Err(ExtractionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_model_failure_is_unavailable() {
        let extractor =
            extractor_answering(Err(GenerationError::Quota("rate limited".to_string())));

        let err = extractor.extract("text").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_long_input_is_truncated() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .withf(|prompt: &str| !prompt.contains("xxxxxx"))
            .returning(|_| Ok("[]".to_string()));
        let extractor = LlmEntityExtractor::new(Arc::new(model)).with_max_input_chars(5);

        let entities = extractor.extract("xxxxxxxxxx").await.unwrap();
        assert!(entities.is_empty());
    }
}
