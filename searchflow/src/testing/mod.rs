//! Test doubles and fixtures for pipeline tests and benchmarks.
//!
//! This module provides:
//! - In-memory implementations of the four capability traits
//! - Canned scenario data
//! - Assertions over overviews and reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_links, assert_no_sources, assert_slots_aligned};
pub use fixtures::{
    graphene_fixture, hit, ScenarioFixture, EXPANSION_MARKER, GRAPHENE_EXPANSION, GRAPHENE_QUERY,
    SYNTHESIS_MARKER,
};
pub use mocks::{
    ScriptedLanguageModel, StaticEntityExtractor, StaticPageFetcher, StaticSearchProvider,
};
