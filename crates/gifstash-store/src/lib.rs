//! Embedded per-tenant storage for gifstash.
//!
//! Every tenant owns one redb file. This crate defines the table layout
//! inside those files, the image codec guarding what may be written, the
//! namespaced object store, and the cache that multiplexes concurrent
//! requests onto a single open handle per tenant.
//!
//! # Layout
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | `accounts-by-token` | access token | account JSON |
//! | `account-id-index` | account id | access token |
//! | `permission-rules` | path pattern | required scope |
//! | `objects` | object id | image bytes |
//! | `namespace-members:<ns>` | object id | unit |
//! | `namespace-registry` | namespace | unit |
//!
//! # Design Rules
//!
//! 1. Object bytes are written before the membership that references them,
//!    and both land in the same write transaction as the registry entry.
//! 2. Read transactions never create tables; a missing table is an error.
//! 3. At most one open handle exists per tenant file, and a handle with live
//!    leases is never closed.
//! 4. No write transaction is held across network I/O.

pub mod cache;
pub mod codec;
pub mod error;
pub mod objects;
pub mod primitives;
pub mod tables;

pub use cache::{RedbOpener, StoreOpener, TenantCache, TenantLease};
pub use codec::{ImagePayload, IMAGE_MEDIA_TYPE};
pub use error::{StoreError, StoreResult};
pub use objects::{sample_ordinals, NamespaceStore, MAX_SAMPLE_COLLISIONS};
pub use redb::Database;
