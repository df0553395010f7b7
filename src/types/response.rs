//! Result-side types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Rows materialized by the query executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    columns: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
    truncated: bool,
}

impl ExecutionResult {
    /// Create execution result.
    ///
    /// # Arguments
    ///
    /// * `columns` - Column names in select-list order
    /// * `rows` - Row tuples, each aligned with `columns`
    /// * `truncated` - Whether the row cap stopped materialization
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>, truncated: bool) -> Self {
        Self {
            columns,
            rows,
            truncated,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<JsonValue>] {
        &self.rows
    }

    /// Number of materialized rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// API response for one generated query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsePayload {
    /// Statement that was executed
    pub sql_query: String,

    /// Rows as JSON objects (nested objects flattened to dotted keys)
    pub results: Vec<Map<String, JsonValue>>,

    /// Column order of `results`
    pub columns: Vec<String>,

    /// Number of rows in `results`
    pub row_count: usize,

    /// Row cap was hit
    pub truncated: bool,

    /// CSV rendering of `results`, base64 encoded (empty when no rows)
    pub csv_base64: String,

    /// Suggested download name (empty when no rows)
    pub csv_filename: String,

    /// Natural-language answer, omitted when summarization failed or is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
