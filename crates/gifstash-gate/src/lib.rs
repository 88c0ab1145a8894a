//! # gifstash-gate
//!
//! Admission for gifstash. Every request runs through a
//! [`RequestPipeline`] of named stages before its handler:
//!
//! 1. **Authenticate**: resolve the bearer token to an account.
//! 2. **Authorize**: match the path against stored permission rules.
//! 3. **Datastore**: pick the tenant and lease its store from the cache.
//!
//! The crate also owns account management and first-start bootstrap over
//! the shared configuration database.

pub mod accounts;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod stage;
pub mod stages;

pub use accounts::{AccountKey, AccountStore};
pub use bootstrap::{bootstrap, AdminTokenSink, BootstrapReport, FileTokenSink};
pub use context::{AuthenticatedRequest, RequestContext};
pub use error::{GateError, GateResult};
pub use pipeline::{Admission, RequestPipeline};
pub use policy::{default_rules, has_sufficient_permissions, PermissionRule, PolicyEngine};
pub use stage::{PipelineStage, StageDecision, StageResult};
