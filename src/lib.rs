//! askdb - natural language questions answered with read-only SQL
//!
//! Turns a question plus a schema description into a single validated
//! `SELECT`, runs it against PostgreSQL or MySQL and returns the rows with a
//! CSV attachment and an optional summary.
//!
//! Can be used as:
//! - HTTP service (`askdb serve`)
//! - CLI (`askdb ask`, `askdb validate`)
//! - Library (`Pipeline` with your own `QueryBackend` / `CompletionProvider`)
//!
//! Every generated statement passes [`sql::SqlValidator`] before execution;
//! [`query::QueryExecutor`] only accepts a [`sql::ValidatedQuery`].

pub mod config;
pub mod db;
pub mod export;
pub mod llm;
pub mod otel;
pub mod pipeline;
pub mod query;
pub mod results;
pub mod schema;
pub mod scrub;
pub mod server;
pub mod sql;
pub mod types;

pub use config::Settings;
pub use db::{DatabaseKind, QueryBackend};
pub use pipeline::{AppContext, Pipeline, PipelineOptions};
pub use sql::{SqlValidator, ValidatedQuery};
pub use types::{QueryGenError, ResponsePayload, Result};
