//! OpenTelemetry instrumentation for askdb.
//!
//! Follows OpenTelemetry semantic conventions:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//! - https://opentelemetry.io/docs/specs/semconv/gen-ai/gen-ai-spans/
//!
//! # Database Semantic Conventions
//!
//! **Required attributes**:
//! - `db.system.name`: `"postgresql"` or `"mysql"`
//!
//! **Recommended**:
//! - `db.operation.name`: `SELECT`, `DESCRIBE`, `introspect`
//! - `db.query.text`: Validated statement, credential-scrubbed
//! - `db.response.returned_rows`
//!
//! # Model Call Conventions
//!
//! One `gen_ai.client` span per attempt with `gen_ai.system`,
//! `gen_ai.request.model` and the attempt number.
//!
//! # Example
//!
//! ```rust,ignore
//! use askdb::otel::{db_query_span, DbOperation};
//! use tracing::Instrument;
//!
//! let span = db_query_span(DatabaseKind::Postgres, query.sql_text());
//! let rows = backend.fetch_rows(query.sql_text(), 1000).instrument(span).await?;
//! ```

pub mod db;
pub mod init;
pub mod llm;

pub use db::{db_query_span, db_span, record_db_metrics, DbOperation};
pub use init::{init_tracing, shutdown_tracing};
pub use llm::{gen_ai_span, record_gen_ai_error};
