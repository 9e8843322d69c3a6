//! Lifecycle event payloads for one pipeline run.

use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::StageName;
use crate::errors::{Degradation, SearchflowError};
use crate::events::EventSink;

/// Emits lifecycle events for a single run.
///
/// Every payload carries the run id so events from concurrent runs sharing
/// one sink can be told apart.
#[derive(Clone)]
pub struct RunEvents {
    sink: Arc<dyn EventSink>,
    run_id: Uuid,
}

impl RunEvents {
    /// Creates an emitter for the given run.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, run_id: Uuid) -> Self {
        Self { sink, run_id }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// `pipeline.started`
    pub fn pipeline_started(&self, query: &str) {
        self.emit("pipeline.started", json!({ "query": query }));
    }

    /// `stage.started`
    pub fn stage_started(&self, stage: StageName) {
        self.emit("stage.started", json!({ "stage": stage.to_string() }));
    }

    /// `stage.completed`, with stage-specific counters under `extra`.
    pub fn stage_completed(&self, stage: StageName, duration_ms: f64, extra: Value) {
        self.emit(
            "stage.completed",
            Self::build_stage_payload(stage, duration_ms, extra),
        );
    }

    /// `stage.degraded`, once per absorbed failure.
    pub fn stage_degraded(&self, stage: StageName, degradation: &Degradation) {
        self.emit(
            "stage.degraded",
            json!({
                "stage": stage.to_string(),
                "subject": degradation.subject,
                "error": degradation.error,
            }),
        );
    }

    /// `pipeline.completed`
    pub fn pipeline_completed(&self, duration_ms: f64, degradations: usize, links: usize) {
        self.emit(
            "pipeline.completed",
            json!({
                "duration_ms": duration_ms,
                "degradations": degradations,
                "links": links,
            }),
        );
    }

    /// `pipeline.failed`
    pub fn pipeline_failed(&self, error: &SearchflowError, duration_ms: f64) {
        self.emit(
            "pipeline.failed",
            json!({
                "error_kind": error.kind(),
                "error": error.to_string(),
                "duration_ms": duration_ms,
            }),
        );
    }

    /// Builds a `stage.completed` payload.
    #[must_use]
    pub fn build_stage_payload(stage: StageName, duration_ms: f64, extra: Value) -> Value {
        let mut payload = json!({
            "stage": stage.to_string(),
            "duration_ms": duration_ms,
        });
        if !extra.is_null() {
            payload["extra"] = extra;
        }
        payload
    }

    fn emit(&self, event_type: &str, mut payload: Value) {
        payload["run_id"] = json!(self.run_id.to_string());
        self.sink.try_emit(event_type, Some(payload));
    }
}

impl std::fmt::Debug for RunEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEvents")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
