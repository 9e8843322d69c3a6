//! Query expansion through the language model.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::StageResult;
use crate::core::{ExpandedQuerySet, Query};
use crate::errors::{Degradation, DegradedStage, GenerationError};
use crate::pipeline::{with_retry, RetryConfig};
use crate::prompts::Prompts;
use crate::providers::LanguageModel;

/// Leading list markers: bullets and `1.` / `2)` numbering.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s*").expect("list marker pattern is valid"));

/// Derives related search queries from the user's query.
pub struct QueryExpander {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<Prompts>,
    retry: RetryConfig,
}

impl QueryExpander {
    /// Creates an expander with default prompts and no retries.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            prompts: Arc::new(Prompts::default()),
            retry: RetryConfig::default(),
        }
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

    /// Returns the original query followed by up to `max_expansions`
    /// distinct related queries.
    ///
    /// A failing model call is recorded as a degradation and yields the
    /// original query alone.
    pub async fn expand(
        &self,
        query: &Query,
        max_expansions: usize,
    ) -> StageResult<ExpandedQuerySet> {
        let mut set = ExpandedQuerySet::new(query, max_expansions.saturating_add(1));
        if max_expansions == 0 {
            return StageResult::clean(set);
        }

        let prompt = self.prompts.render_expansion(max_expansions, query.as_str());
        let response = with_retry(&self.retry, query.as_str(), GenerationError::is_transient, || {
            self.model.generate(&prompt)
        })
        .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    query = %query,
                    error = %e,
                    "Query expansion failed, using original query only"
                );
                let degradation = Degradation::new(DegradedStage::Expansion, query.as_str(), e);
                return StageResult::degraded(set, vec![degradation]);
            }
        };

        for candidate in parse_candidates(&response) {
            if set.is_full() {
                break;
            }
            if !set.try_push(&candidate) {
                debug!(candidate = %candidate, "Dropped expansion candidate");
            }
        }

        debug!(queries = ?set.as_slice(), "Expanded query");
        StageResult::clean(set)
    }
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Extracts candidate queries from a model response.
///
/// Accepts a JSON array of strings, a JSON object with a `queries` array,
/// or one query per line.
fn parse_candidates(response: &str) -> Vec<String> {
    let body = strip_code_fence(response.trim());

    if let Some(queries) = parse_json_candidates(body) {
        return queries;
    }
    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Some(queries) = parse_json_candidates(&body[start..=end]) {
                return queries;
            }
        }
    }

    body.lines().filter_map(clean_line).collect()
}

fn parse_json_candidates(text: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("queries") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    )
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn clean_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.ends_with(':') || matches!(line, "[" | "]" | "{" | "}") {
        return None;
    }
    let line = LIST_MARKER.replace(line, "");
    let cleaned = line
        .trim()
        .trim_end_matches(',')
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLanguageModel;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn query(text: &str) -> Query {
        Query::new(text).unwrap()
    }

    fn expander_answering(answer: &str) -> QueryExpander {
        let answer = answer.to_string();
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(move |_| Ok(answer.clone()));
        QueryExpander::new(Arc::new(model))
    }

    #[tokio::test]
    async fn test_zero_expansions_skips_model() {
        let mut model = MockLanguageModel::new();
        model.expect_generate().never();
        let expander = QueryExpander::new(Arc::new(model));

        let result = expander.expand(&query("graphene batteries"), 0).await;
        assert_eq!(result.value.as_slice(), ["graphene batteries"]);
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_json_array_response() {
        let expander = expander_answering(r#"["graphene battery lifespan", "graphene supercapacitors"]"#);

        let result = expander.expand(&query("graphene batteries"), 3).await;
        assert_eq!(
            result.value.as_slice(),
            ["graphene batteries", "graphene battery lifespan", "graphene supercapacitors"]
        );
    }

    #[tokio::test]
    async fn test_queries_object_response() {
        let expander = expander_answering(r#"{"queries": ["rust async runtimes"]}"#);

        let result = expander.expand(&query("tokio vs async-std"), 2).await;
        assert_eq!(result.value.as_slice(), ["tokio vs async-std", "rust async runtimes"]);
    }

    #[tokio::test]
    async fn test_original_kept_verbatim_and_duplicates_dropped() {
        let expander = expander_answering(
            r#"["GRAPHENE BATTERIES", "  graphene anodes ", "Graphene Anodes", "", "solid state"]"#,
        );

        let result = expander.expand(&query("  Graphene batteries"), 5).await;
        assert_eq!(
            result.value.as_slice(),
            ["  Graphene batteries", "graphene anodes", "solid state"]
        );
    }

    #[tokio::test]
    async fn test_stops_at_max_expansions() {
        let expander = expander_answering(r#"["a", "b", "c", "d"]"#);

        let result = expander.expand(&query("q"), 2).await;
        assert_eq!(result.value.as_slice(), ["q", "a", "b"]);
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_original() {
        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .times(1)
            .returning(|_| Err(GenerationError::Timeout(Duration::from_secs(60))));
        let expander = QueryExpander::new(Arc::new(model));

        let result = expander.expand(&query("graphene batteries"), 3).await;
        assert_eq!(result.value.as_slice(), ["graphene batteries"]);
        assert_eq!(result.degradations.len(), 1);
        assert_eq!(result.degradations[0].stage, DegradedStage::Expansion);
        assert_eq!(result.degradations[0].subject, "graphene batteries");
    }

    #[tokio::test]
    async fn test_transient_failure_retried_when_configured() {
        let mut model = MockLanguageModel::new();
        let mut seq = mockall::Sequence::new();
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(GenerationError::Transport("reset".into())));
        model
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(r#"["b"]"#.to_string()));
        let expander = QueryExpander::new(Arc::new(model)).with_retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_base_delay_ms(1),
        );

        let result = expander.expand(&query("a"), 1).await;
        assert_eq!(result.value.as_slice(), ["a", "b"]);
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_line_fallback() {
        let response = "Here are some queries:\n1. graphene anodes\n2) \"solid state batteries\",\n- lithium sulfur\n• sodium ion";
        assert_eq!(
            parse_candidates(response),
            vec!["graphene anodes", "solid state batteries", "lithium sulfur", "sodium ion"]
        );
    }

    #[test]
    fn test_json_inside_code_fence_and_prose() {
        assert_eq!(parse_candidates("```json\n[\"a\", \"b\"]\n```"), vec!["a", "b"]);
        assert_eq!(parse_candidates("Sure! [\"a\", 3, \"b\"] hope this helps"), vec!["a", "b"]);
    }
}
