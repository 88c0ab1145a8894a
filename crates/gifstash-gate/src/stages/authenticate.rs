use tracing::debug;

use crate::accounts::AccountStore;
use crate::context::RequestContext;
use crate::error::GateError;
use crate::stage::{PipelineStage, StageDecision};

/// Resolves the bearer token to an account.
///
/// Never denies: an absent or unknown token leaves the caller anonymous with
/// an empty permission string, and the rules decide what that may reach.
pub struct AuthenticateStage {
    accounts: AccountStore,
}

impl AuthenticateStage {
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }
}

impl PipelineStage for AuthenticateStage {
    fn name(&self) -> &str {
        "authenticate"
    }

    fn run(&self, context: &mut RequestContext) -> Result<StageDecision, GateError> {
        if context.request.bearer_token.is_empty() {
            return Ok(StageDecision::Continue);
        }
        match self.accounts.find_by_token(&context.request.bearer_token)? {
            Some(account) => {
                context.permissions = account.permissions.raw();
                context.request.account = Some(account);
            }
            None => debug!(path = %context.request.path, "unknown bearer token"),
        }
        Ok(StageDecision::Continue)
    }
}
