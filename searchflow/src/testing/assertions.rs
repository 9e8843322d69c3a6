//! Assertions over pipeline outputs.

use crate::core::{ExtractedDocument, Overview, ResultSet, NO_SOURCES_SUMMARY};

/// Asserts that the overview cites exactly `urls`, in order.
pub fn assert_links(overview: &Overview, urls: &[&str]) {
    let actual: Vec<&str> = overview.links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(actual, urls, "Unexpected overview links");
}

/// Asserts that the overview is the degraded "no sources" answer.
pub fn assert_no_sources(overview: &Overview) {
    assert_eq!(overview.summary_text, NO_SOURCES_SUMMARY);
    assert!(
        overview.links.is_empty(),
        "Expected no links, got {:?}",
        overview.links
    );
}

/// Asserts that collected documents line up one-to-one with the result set.
pub fn assert_slots_aligned(results: &ResultSet, documents: &[ExtractedDocument]) {
    assert_eq!(
        results.len(),
        documents.len(),
        "Expected one document per search result"
    );
    for (index, (result, document)) in results.iter().zip(documents).enumerate() {
        assert_eq!(
            result.url, document.url,
            "Document {index} does not match its search result"
        );
    }
}
