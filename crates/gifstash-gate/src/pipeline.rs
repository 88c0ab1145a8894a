use std::sync::Arc;
use std::time::Instant;

use gifstash_store::TenantCache;
use tracing::debug;

use crate::accounts::AccountStore;
use crate::context::RequestContext;
use crate::error::GateError;
use crate::policy::PolicyEngine;
use crate::stage::{PipelineStage, StageDecision, StageResult};
use crate::stages::{AuthenticateStage, AuthorizeStage, DatastoreStage};

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// The outcome of running a request through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied { stage: String, reason: String },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

// ---------------------------------------------------------------------------
// RequestPipeline
// ---------------------------------------------------------------------------

/// An ordered list of stages every request passes before its handler runs.
pub struct RequestPipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl RequestPipeline {
    /// An empty pipeline that admits everything.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Authenticate -> Authorize -> Datastore.
    ///
    /// With `skip_auth` the authorize stage is left out; callers are still
    /// authenticated so their own datastore can be resolved.
    pub fn with_default_stages(
        accounts: AccountStore,
        policy: Arc<PolicyEngine>,
        cache: TenantCache,
        skip_auth: bool,
    ) -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(Box::new(AuthenticateStage::new(accounts.clone())));
        if !skip_auth {
            pipeline.add_stage(Box::new(AuthorizeStage::new(policy)));
        }
        pipeline.add_stage(Box::new(DatastoreStage::new(accounts, cache)));
        pipeline
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage on `context`, stopping at the first denial.
    ///
    /// Stage results are appended to `context.stage_results`. On error the
    /// context keeps whatever earlier stages attached, including any lease.
    pub fn run(&self, context: &mut RequestContext) -> Result<Admission, GateError> {
        let started = Instant::now();
        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.run(context)?;
            let elapsed = stage_start.elapsed();

            let (passed, reason) = match &decision {
                StageDecision::Continue => (true, None),
                StageDecision::Deny { reason } => (false, Some(reason.clone())),
            };
            context.stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed,
                reason,
                elapsed,
            });

            if let StageDecision::Deny { reason } = decision {
                debug!(stage = stage.name(), %reason, "request denied");
                return Ok(Admission::Denied {
                    stage: stage.name().to_string(),
                    reason,
                });
            }
        }
        debug!(elapsed = ?started.elapsed(), "request admitted");
        Ok(Admission::Admitted)
    }
}

impl Default for RequestPipeline {
    fn default() -> Self {
        Self::new()
    }
}
