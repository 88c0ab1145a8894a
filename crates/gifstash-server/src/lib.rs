//! HTTP server for gifstash.
//!
//! Serves per-tenant image namespaces and account administration. Every
//! route except `/v1/health` runs through the request pipeline from
//! `gifstash-gate` before its handler sees the request.

pub mod admin;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServiceConfig;
pub use error::{ErrorKind, ServerError, ServerResult};
pub use fetch::{HttpFetcher, PayloadFetcher};
pub use router::build_router;
pub use server::GifstashServer;
pub use state::AppState;
