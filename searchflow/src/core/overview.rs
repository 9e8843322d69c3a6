//! The terminal artifact of a pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::Entity;

/// Summary used when no source could be retrieved.
pub const NO_SOURCES_SUMMARY: &str = "No sources could be retrieved for this query.";

/// A cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Source URL.
    pub url: String,
    /// Source title.
    pub title: String,
}

/// The synthesized answer with its sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    /// The original query, verbatim.
    pub query: String,
    /// Generated overview text.
    pub summary_text: String,
    /// Sources in result-set order.
    pub links: Vec<Link>,
    /// Merged entities, most frequent first.
    pub entities: Vec<Entity>,
}

impl Overview {
    /// Creates the degraded overview returned when every source failed.
    #[must_use]
    pub fn no_sources(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            summary_text: NO_SOURCES_SUMMARY.to_string(),
            links: Vec::new(),
            entities: Vec::new(),
        }
    }

    /// Returns true if the overview was produced without any source.
    #[must_use]
    pub fn has_sources(&self) -> bool {
        !self.links.is_empty()
    }
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary_text.trim_end())?;

        if !self.links.is_empty() {
            writeln!(f)?;
            writeln!(f, "Sources:")?;
            for (index, link) in self.links.iter().enumerate() {
                if link.title.is_empty() {
                    writeln!(f, "  {}. {}", index + 1, link.url)?;
                } else {
                    writeln!(f, "  {}. {} <{}>", index + 1, link.title, link.url)?;
                }
            }
        }

        if !self.entities.is_empty() {
            writeln!(f)?;
            writeln!(f, "Entities:")?;
            for entity in &self.entities {
                writeln!(f, "  - {} ({}, {})", entity.text, entity.label, entity.count)?;
            }
        }

        Ok(())
    }
}
