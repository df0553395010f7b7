//! Database operation instrumentation.
//!
//! Implements OpenTelemetry semantic conventions for SQL client spans.

use crate::db::DatabaseKind;
use crate::scrub::scrub_credentials;
use tracing::{field, span, Level, Span};

/// Database operation types (maps to `db.operation.name`).
#[derive(Debug, Clone, Copy)]
pub enum DbOperation {
    /// Validated read query
    Select,
    /// Column lookup for an empty result
    Describe,
    /// `information_schema` scan
    Introspect,
}

impl DbOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Describe => "DESCRIBE",
            Self::Introspect => "introspect",
        }
    }
}

/// Create database operation span with semantic conventions.
///
/// # Arguments
///
/// * `system` - Database engine (`db.system.name`)
/// * `operation` - Operation type
/// * `namespace` - Schema or database name (optional)
///
/// # Returns
///
/// Tracing span with OpenTelemetry semantic attributes
pub fn db_span(system: DatabaseKind, operation: DbOperation, namespace: Option<&str>) -> Span {
    let span = span!(
        Level::INFO,
        "db",
        otel.name = operation.as_str(),
        otel.kind = "client",
        db.system.name = system.as_str(),
        db.operation.name = operation.as_str(),
        db.namespace = field::Empty,
        db.response.returned_rows = field::Empty,
    );

    if let Some(ns) = namespace {
        span.record("db.namespace", ns);
    }

    span
}

/// Create query span for a validated statement.
///
/// The statement text is scrubbed before it is attached.
///
/// # Example
///
/// ```rust,ignore
/// let span = db_query_span(DatabaseKind::Postgres, "SELECT * FROM customers");
/// backend.fetch_rows(sql, 1000).instrument(span).await?;
/// ```
pub fn db_query_span(system: DatabaseKind, query_text: &str) -> Span {
    span!(
        Level::INFO,
        "db.query",
        otel.name = DbOperation::Select.as_str(),
        otel.kind = "client",
        db.system.name = system.as_str(),
        db.operation.name = DbOperation::Select.as_str(),
        db.query.text = %scrub_credentials(query_text),
        db.response.returned_rows = field::Empty,
        db.response.truncated = field::Empty,
    )
}

/// Record row metrics on a query span.
pub fn record_db_metrics(span: &Span, rows_returned: usize, truncated: bool) {
    span.record("db.response.returned_rows", rows_returned);
    span.record("db.response.truncated", truncated);
}
