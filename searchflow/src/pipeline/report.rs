//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{DocumentStatus, ExtractedDocument, Overview, StageName};
use crate::errors::Degradation;

/// Counts of collected documents per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Documents with usable text.
    pub ok: usize,
    /// Documents fetched without any text.
    pub empty: usize,
    /// Documents whose fetch failed or timed out.
    pub fetch_failed: usize,
}

impl DocumentStats {
    /// Tallies the documents by status.
    #[must_use]
    pub fn from_documents(documents: &[ExtractedDocument]) -> Self {
        documents.iter().fold(Self::default(), |mut stats, doc| {
            match doc.status {
                DocumentStatus::Ok => stats.ok += 1,
                DocumentStatus::Empty => stats.empty += 1,
                DocumentStatus::FetchFailed => stats.fetch_failed += 1,
            }
            stats
        })
    }

    /// Total number of documents.
    #[must_use]
    pub fn total(&self) -> usize {
        self.ok + self.empty + self.fetch_failed
    }
}

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    /// The stage.
    pub stage: StageName,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

/// Everything known about a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique, time-ordered run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub searched_on: DateTime<Utc>,
    /// The query, verbatim.
    pub query: String,
    /// The original query followed by its expansions.
    pub expanded_queries: Vec<String>,
    /// Deduplicated search results.
    pub result_count: usize,
    /// Collected documents per status.
    pub documents: DocumentStats,
    /// Merged entities.
    pub entity_count: usize,
    /// Per-stage durations, in execution order.
    pub stage_timings: Vec<StageTiming>,
    /// Upstream failures absorbed during the run.
    pub degradations: Vec<Degradation>,
    /// Total run duration in milliseconds.
    pub duration_ms: f64,
    /// The produced overview.
    pub overview: Overview,
}

impl RunReport {
    /// Returns true if any upstream failure was absorbed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Returns the timing recorded for `stage`, if it ran.
    #[must_use]
    pub fn timing(&self, stage: StageName) -> Option<f64> {
        self.stage_timings
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.duration_ms)
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SearchResult;

    fn source(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: String::new(),
            snippet: String::new(),
            source_query: "q".to_string(),
        }
    }

    #[test]
    fn test_document_stats() {
        let documents = vec![
            ExtractedDocument::fetched(&source("https://a.example"), "text"),
            ExtractedDocument::fetched(&source("https://b.example"), ""),
            ExtractedDocument::failed(&source("https://c.example"), "HTTP status 404"),
            ExtractedDocument::failed(&source("https://d.example"), "HTTP status 500"),
        ];

        let stats = DocumentStats::from_documents(&documents);
        assert_eq!(
            stats,
            DocumentStats {
                ok: 1,
                empty: 1,
                fetch_failed: 2,
            }
        );
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn test_report_serializes() {
        let report = RunReport {
            run_id: Uuid::now_v7(),
            searched_on: Utc::now(),
            query: "q".to_string(),
            expanded_queries: vec!["q".to_string()],
            result_count: 0,
            documents: DocumentStats::default(),
            entity_count: 0,
            stage_timings: vec![StageTiming {
                stage: StageName::Expand,
                duration_ms: 1.5,
            }],
            degradations: Vec::new(),
            duration_ms: 2.0,
            overview: Overview::no_sources("q"),
        };

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stage_timings"][0]["stage"], "expand");
        assert_eq!(value["documents"]["fetch_failed"], 0);
        assert_eq!(report.timing(StageName::Expand), Some(1.5));
        assert_eq!(report.timing(StageName::Annotate), None);
        assert!(!report.is_degraded());
    }
}
