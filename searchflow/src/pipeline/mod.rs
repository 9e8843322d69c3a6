//! Pipeline assembly and execution.
//!
//! This module provides:
//! - The [`Pipeline`] and its [`PipelineBuilder`]
//! - Run reports with per-stage timings
//! - Retry with backoff for transient upstream failures

mod report;
mod retry;
mod runner;


pub use report::{DocumentStats, RunReport, StageTiming};
pub use retry::{with_retry, BackoffStrategy, JitterStrategy, RetryConfig};
pub use runner::{Pipeline, PipelineBuilder};
