use gifstash_store::TenantCache;
use gifstash_types::AccountRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::accounts::AccountStore;
use crate::context::RequestContext;
use crate::error::{GateError, GateResult};
use crate::stage::{PipelineStage, StageDecision};

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("uuid pattern compiles")
});

/// The account whose datastore serves `context`.
///
/// An authenticated caller is served from their own datastore. Otherwise
/// every UUID in the path is tried, left to right, as an account id.
pub fn resolve_tenant(accounts: &AccountStore, context: &RequestContext) -> GateResult<AccountRecord> {
    if let Some(account) = &context.request.account {
        return Ok(account.clone());
    }
    for candidate in UUID_PATTERN.find_iter(&context.request.path) {
        match accounts.find_by_id(candidate.as_str()) {
            Ok(account) => return Ok(account),
            Err(GateError::AccountNotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(GateError::TenantNotFound(context.request.path.clone()))
}

/// Resolves the tenant and leases its datastore from the cache.
pub struct DatastoreStage {
    accounts: AccountStore,
    cache: TenantCache,
}

impl DatastoreStage {
    pub fn new(accounts: AccountStore, cache: TenantCache) -> Self {
        Self { accounts, cache }
    }
}

impl PipelineStage for DatastoreStage {
    fn name(&self) -> &str {
        "datastore"
    }

    fn run(&self, context: &mut RequestContext) -> Result<StageDecision, GateError> {
        let tenant = resolve_tenant(&self.accounts, context)?;
        let lease = self.cache.acquire(tenant.datastore_name())?;
        debug!(tenant = %tenant.id, datastore = lease.key(), "leased tenant datastore");
        context.tenant = Some(tenant);
        context.lease = Some(lease);
        Ok(StageDecision::Continue)
    }
}
