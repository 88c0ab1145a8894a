//! Foundation types for gifstash.
//!
//! This crate provides the identifier and account types shared by every
//! other gifstash crate.
//!
//! # Key Types
//!
//! - [`ObjectId`]: 128-bit random identifier rendered as grouped hex
//! - [`AccountRecord`]: identity owning a tenant store
//! - [`PermissionSet`]: deduplicated set of scope strings
//! - [`generate_token`] / [`generate_datastore_name`]: high-entropy secrets

pub mod account;
pub mod error;
pub mod identifier;

pub use account::{AccountRecord, PermissionSet, ADMIN_SCOPE, DEFAULT_DATASTORE, PUBLIC_SCOPE};
pub use error::TypeError;
pub use identifier::{generate_datastore_name, generate_token, ObjectId, DATASTORE_SUFFIX};
