use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::GateError;
use crate::policy::PolicyEngine;
use crate::stage::{PipelineStage, StageDecision};

/// Checks the request path against the permission rules.
pub struct AuthorizeStage {
    policy: Arc<PolicyEngine>,
}

impl AuthorizeStage {
    pub fn new(policy: Arc<PolicyEngine>) -> Self {
        Self { policy }
    }
}

impl PipelineStage for AuthorizeStage {
    fn name(&self) -> &str {
        "authorize"
    }

    fn run(&self, context: &mut RequestContext) -> Result<StageDecision, GateError> {
        if self
            .policy
            .is_authorized(&context.request.path, &context.permissions)?
        {
            Ok(StageDecision::Continue)
        } else {
            Ok(StageDecision::Deny {
                reason: format!("no rule admits {}", context.request.path),
            })
        }
    }
}
