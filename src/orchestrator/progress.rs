//! Progress events
//!
//! The orchestrator reports step boundaries through a callback sink invoked
//! synchronously from the sequential pipeline. The embedder forwards these
//! however it likes (typically as server-sent events).

use crate::planner::StepPurpose;
use crate::types::{StepMetadata, StepOutputKind};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStart {
    pub step: usize,
    pub purpose: StepPurpose,
    pub model: String,
    pub total_steps: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepComplete {
    pub step: usize,
    pub purpose: StepPurpose,
    pub model: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: StepOutputKind,
    pub execution_time_ms: u64,
    pub metadata: StepMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorUpdate {
    pub notes: String,
}

/// Callback interface for step progress. All methods default to no-ops so
/// sinks only implement what they consume.
pub trait ProgressSink: Send + Sync {
    fn on_step_start(&self, _event: &StepStart) {}
    fn on_step_complete(&self, _event: &StepComplete) {}
    fn on_coordinator_update(&self, _event: &CoordinatorUpdate) {}
}

/// Sink for callers that do not care about progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}
