//! The five pipeline stages.
//!
//! Each stage is a plain struct holding the capabilities and limits it
//! needs. Stages that absorb upstream failures return a [`StageResult`]
//! carrying the value and the recorded degradations; only synthesis can
//! fail the run.

mod aggregator;
mod annotator;
mod collector;
mod expander;
mod result;
mod synthesizer;

pub use aggregator::ResultAggregator;
pub use annotator::EntityAnnotator;
pub use collector::ContentCollector;
pub use expander::QueryExpander;
pub use result::StageResult;
pub use synthesizer::OverviewSynthesizer;
