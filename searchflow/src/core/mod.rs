//! Core domain model types for searchflow.
//!
//! This module contains the values that flow between the pipeline stages:
//! - The validated query and its expansion
//! - Search results keyed by normalized URL
//! - Extracted documents with an explicit per-item status
//! - Entities and the final overview

mod document;
mod overview;
mod query;
mod results;
mod status;

pub use document::{Entity, ExtractedDocument, RawEntity};
pub use overview::{Link, Overview, NO_SOURCES_SUMMARY};
pub use query::{ExpandedQuerySet, Query};
pub use results::{ResultSet, SearchHit, SearchResult};
pub use status::{DocumentStatus, StageName};
