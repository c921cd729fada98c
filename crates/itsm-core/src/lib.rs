#![forbid(unsafe_code)]
//! itsm-core library.
//!
//! Incidents, the records they reference, and the relationship graph that
//! keeps those references consistent.
//!
//! # Conventions
//!
//! - **Errors**: link operations return [`error::LinkError`]; file and
//!   config loading use `anyhow::Result` with context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Mutation**: relation fields change only through
//!   [`graph::RelationshipGraph`].

pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod notify;
pub mod store;

pub use error::{ErrorCode, LinkError};
pub use graph::{Outcome, RelationshipGraph};
pub use store::{Dataset, EntityStore};
