use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::GateError;

/// The decision produced by a single pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// The request may proceed to the next stage.
    Continue,
    /// The request is refused.
    Deny {
        /// Human-readable reason for denial.
        reason: String,
    },
}

/// The result of a single stage evaluation, recorded for diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    pub reason: Option<String>,
    pub elapsed: Duration,
}

/// One step of request admission.
///
/// Stages run in order on the same [`RequestContext`] and may enrich it.
/// A `Deny` stops the pipeline; an `Err` aborts it.
pub trait PipelineStage: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    fn run(&self, context: &mut RequestContext) -> Result<StageDecision, GateError>;
}
