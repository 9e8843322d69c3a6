//! Prompt templates for the language-model calls.
//!
//! Templates use `{name}` placeholders. Rendering is a single pass over the
//! template, so text substituted into one placeholder (a query or page text)
//! is never scanned for further placeholders.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::errors::{Result, SearchflowError};

/// Required placeholders per template.
mod placeholders {
    pub const EXPANSION: &[&str] = &["{max}", "{query}"];
    pub const SYNTHESIS: &[&str] = &["{query}", "{sources}"];
    pub const ENTITIES: &[&str] = &["{text}"];
}

const DEFAULT_EXPANSION_TEMPLATE: &str = r#"Generate up to {max} search queries related to the following query. Cover synonyms, narrower sub-questions and alternative phrasings.

    {query}

Return only a JSON array of strings, for example:

    ["related query 1", "related query 2"]
"#;

const DEFAULT_SYNTHESIS_TEMPLATE: &str = r#"Analyze the numbered sources below and write a concise overview that answers:

    {query}

Sources:

{sources}
{entities}
When writing the overview:
- ignore information that is irrelevant, duplicated or inconsistent with the majority of sources
- cite sources inline by number, e.g. [1] or [2][3]
- write about the subject itself and do not mention "the sources"
"#;

const DEFAULT_ENTITY_TEMPLATE: &str = r#"Identify the named entities in the text below. Label each one PERSON, ORGANIZATION, LOCATION, DATE or OTHER.

Text:

{text}

Return only a JSON array of objects with "text" and "label" fields, for example:

    [{"text": "Marie Curie", "label": "PERSON"}]
"#;

/// Prompt templates used by the pipeline.
///
/// # Template Placeholders
///
/// - `expansion_template`: `{max}`, `{query}`
/// - `synthesis_template`: `{query}`, `{sources}`, optional `{entities}`
/// - `entity_template`: `{text}`
///
/// # Example
///
/// ```
/// use searchflow::prompts::Prompts;
///
/// let prompts = Prompts::default();
/// let rendered = prompts.render_expansion(3, "graphene batteries");
/// assert!(rendered.contains("graphene batteries"));
/// assert!(rendered.contains("up to 3"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    /// Template for query expansion.
    pub expansion_template: String,
    /// Template for the final overview.
    pub synthesis_template: String,
    /// Template for LLM-backed entity extraction.
    pub entity_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            expansion_template: DEFAULT_EXPANSION_TEMPLATE.to_string(),
            synthesis_template: DEFAULT_SYNTHESIS_TEMPLATE.to_string(),
            entity_template: DEFAULT_ENTITY_TEMPLATE.to_string(),
        }
    }
}

impl Prompts {
    /// Renders the query-expansion prompt.
    #[must_use]
    pub fn render_expansion(&self, max: usize, query: &str) -> String {
        let max = max.to_string();
        render(&self.expansion_template, &[("max", &max), ("query", query)])
    }

    /// Renders the synthesis prompt.
    ///
    /// `entities` is substituted as-is and may be empty.
    #[must_use]
    pub fn render_synthesis(&self, query: &str, sources: &str, entities: &str) -> String {
        render(
            &self.synthesis_template,
            &[("query", query), ("sources", sources), ("entities", entities)],
        )
    }

    /// Renders the entity-extraction prompt.
    #[must_use]
    pub fn render_entities(&self, text: &str) -> String {
        render(&self.entity_template, &[("text", text)])
    }

    /// Validates that every template carries its required placeholders.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("expansion_template", &self.expansion_template, placeholders::EXPANSION),
            ("synthesis_template", &self.synthesis_template, placeholders::SYNTHESIS),
            ("entity_template", &self.entity_template, placeholders::ENTITIES),
        ];

        let mut errors = Vec::new();
        for (name, template, required) in checks {
            if template.trim().is_empty() {
                errors.push(format!("{name} cannot be empty"));
                continue;
            }
            let missing: Vec<&str> = required
                .iter()
                .filter(|p| !template.contains(*p))
                .copied()
                .collect();
            if !missing.is_empty() {
                errors.push(format!(
                    "{name} missing required placeholders: {}",
                    missing.join(", ")
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SearchflowError::config(errors.join("; ")))
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Substitutes `{name}` placeholders in one pass; unknown names are kept.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let values: HashMap<&str, &str> = values.iter().copied().collect();
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), |v| (*v).to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts_validate() {
        assert!(Prompts::default().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_placeholders() {
        let prompts = Prompts {
            expansion_template: "Expand {query}".to_string(),
            synthesis_template: String::new(),
            ..Prompts::default()
        };

        let err = prompts.validate().unwrap_err().to_string();
        assert!(err.contains("expansion_template missing required placeholders: {max}"));
        assert!(err.contains("synthesis_template cannot be empty"));
    }

    #[test]
    fn test_render_is_single_pass() {
        let prompts = Prompts::default();
        let rendered = prompts.render_synthesis("what is {sources}?", "page says {query}", "");

        assert!(rendered.contains("what is {sources}?"));
        assert!(rendered.contains("page says {query}"));
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        assert_eq!(render("{a} and {b}", &[("a", "x")]), "x and {b}");
    }

    #[test]
    fn test_entity_prompt_keeps_json_example() {
        let rendered = Prompts::default().render_entities("Ada Lovelace wrote notes.");
        assert!(rendered.contains("Ada Lovelace wrote notes."));
        assert!(rendered.contains(r#"{"text": "Marie Curie", "label": "PERSON"}"#));
    }
}
