//! Built-in pipeline stages.

pub mod authenticate;
pub mod authorize;
pub mod datastore;

pub use authenticate::AuthenticateStage;
pub use authorize::AuthorizeStage;
pub use datastore::{resolve_tenant, DatastoreStage};
