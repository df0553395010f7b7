//! Validated query execution.

use crate::db::QueryBackend;
use crate::otel::{db_query_span, record_db_metrics};
use crate::sql::ValidatedQuery;
use crate::types::{ExecutionCause, ExecutionResult, QueryGenError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};

/// Runs validated statements with a timeout and row cap.
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    timeout: Duration,
    max_rows: usize,
}

impl QueryExecutor {
    /// Create executor.
    ///
    /// # Arguments
    ///
    /// * `backend` - Database backend
    /// * `timeout` - Wall-clock limit per statement
    /// * `max_rows` - Rows materialized before `truncated` is set
    pub fn new(backend: Arc<dyn QueryBackend>, timeout: Duration, max_rows: usize) -> Self {
        Self {
            backend,
            timeout,
            max_rows,
        }
    }

    /// Execute a validated statement.
    ///
    /// The text runs verbatim and is never retried.
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::Execution` with cause `Statement`, `Timeout`
    /// or `Connection`
    pub async fn execute(&self, query: &ValidatedQuery) -> Result<ExecutionResult> {
        let span = db_query_span(self.backend.kind(), query.sql_text());
        let fetch = self.backend.fetch_rows(query.sql_text(), self.max_rows);

        let outcome = tokio::time::timeout(self.timeout, fetch)
            .instrument(span.clone())
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(parent: &span, error = %e, "Query execution failed");
                return Err(e);
            }
            Err(_) => {
                warn!(parent: &span, timeout_secs = self.timeout.as_secs_f64(), "Query timed out");
                return Err(QueryGenError::execution(
                    format!("query exceeded {}s timeout", self.timeout.as_secs_f64()),
                    ExecutionCause::Timeout,
                ));
            }
        };

        record_db_metrics(&span, result.row_count(), result.is_truncated());
        info!(
            parent: &span,
            rows = result.row_count(),
            truncated = result.is_truncated(),
            "Query executed"
        );

        Ok(result)
    }
}
