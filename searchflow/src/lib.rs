//! # Searchflow
//!
//! Turns a free-text query into a short, cited overview.
//!
//! A run goes through five stages:
//!
//! - **Expand**: a language model proposes related queries
//! - **Aggregate**: every query is searched and hits are deduplicated by normalized URL
//! - **Collect**: result pages are fetched concurrently and reduced to readable text
//! - **Annotate** (optional): named entities are extracted and merged
//! - **Synthesize**: one language-model call writes the overview from the numbered sources
//!
//! Failures of individual searches, fetches or extractions are absorbed and
//! reported as degradations. Only an invalid query, a failed synthesis, the
//! run deadline or a caller cancellation fail a run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use searchflow::prelude::*;
//!
//! let config = PipelineConfig::from_env()?;
//! let pipeline = Pipeline::builder()
//!     .config(config)
//!     .with_http_adapters()?
//!     .build()?;
//!
//! let overview = pipeline.run("graphene batteries").await?;
//! println!("{overview}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{Limits, PipelineConfig};
    pub use crate::core::{
        DocumentStatus, Entity, ExtractedDocument, Link, Overview, Query, SearchHit, StageName,
    };
    pub use crate::errors::{
        Degradation, DegradedStage, ExtractionError, FetchError, GenerationError, InputError,
        SearchError, SearchflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RetryConfig, RunReport};
    pub use crate::prompts::Prompts;
    pub use crate::providers::{EntityExtractor, LanguageModel, PageFetcher, SearchProvider};
}
