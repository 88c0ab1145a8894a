use gifstash_store::TenantLease;
use gifstash_types::AccountRecord;

use crate::stage::StageResult;

/// What the transport layer knows about an incoming request.
#[derive(Clone, Debug, Default)]
pub struct AuthenticatedRequest {
    /// Request path, without query string.
    pub path: String,
    /// Bearer token from the `Authorization` header, empty if absent.
    pub bearer_token: String,
    /// The account owning `bearer_token`, once authenticated.
    pub account: Option<AccountRecord>,
}

impl AuthenticatedRequest {
    pub fn new(path: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bearer_token: bearer_token.into(),
            account: None,
        }
    }
}

/// State threaded through the request pipeline and handed to handlers.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub request: AuthenticatedRequest,
    /// The caller's permissions joined with commas; empty when anonymous.
    pub permissions: String,
    /// The account whose datastore serves this request.
    pub tenant: Option<AccountRecord>,
    /// Lease on the tenant datastore, held until the context is dropped.
    pub lease: Option<TenantLease>,
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
}

impl RequestContext {
    pub fn new(request: AuthenticatedRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }
}
