//! Prompt templates for SQL generation and result summaries.

use crate::db::DatabaseKind;
use crate::results::ShapedTable;
use crate::types::{GenerationRequest, QueryGenError, Result};
use serde_json::Value as JsonValue;

/// Rows included in the summary prompt.
pub const SUMMARY_SAMPLE_ROWS: usize = 10;

/// Builds deterministic prompts for one database dialect.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    database: DatabaseKind,
    max_schema_chars: usize,
}

impl PromptBuilder {
    pub fn new(database: DatabaseKind, max_schema_chars: usize) -> Self {
        Self {
            database,
            max_schema_chars,
        }
    }

    /// Render the SQL generation prompt.
    ///
    /// # Arguments
    ///
    /// * `request` - Question and schema description
    ///
    /// # Returns
    ///
    /// Prompt text; schema and question are embedded verbatim
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::SchemaTooLarge` if the schema exceeds the
    /// configured character limit (never truncated)
    pub fn build(&self, request: &GenerationRequest) -> Result<String> {
        let schema = request.schema_description();
        let actual = schema.chars().count();
        if actual > self.max_schema_chars {
            return Err(QueryGenError::SchemaTooLarge {
                actual,
                max: self.max_schema_chars,
            });
        }

        let db = self.database.display_name();
        Ok(format!(
            "You translate questions into a single read-only {db} query.\n\
             \n\
             Schema Information:\n\
             {schema}\n\
             \n\
             Rules:\n\
             - ONLY generate SELECT statements. INSERT, UPDATE, DELETE, MERGE and any DDL are not permitted.\n\
             - Return exactly one SQL statement and nothing else: no markdown, no code fences, no explanation.\n\
             - {syntax}\n\
             - Only reference tables and columns that appear in the schema.\n\
             \n\
             User Query: {question}\n",
            syntax = self.syntax_rules(),
            question = request.question(),
        ))
    }

    /// Render the summary prompt for shaped results.
    ///
    /// Includes at most [`SUMMARY_SAMPLE_ROWS`] rows.
    pub fn build_summary(&self, question: &str, table: &ShapedTable) -> String {
        let sample: Vec<JsonValue> = table
            .rows
            .iter()
            .take(SUMMARY_SAMPLE_ROWS)
            .map(|row| JsonValue::Object(row.clone()))
            .collect();
        let sample_json =
            serde_json::to_string_pretty(&sample).unwrap_or_else(|_| "[]".to_string());

        let truncation = if table.truncated {
            " (the result was cut at the row limit, more rows exist)"
        } else {
            ""
        };

        format!(
            "You are an expert SQL assistant. A user asked a question about a database and \
             has already been shown the matching rows. Answer the question in one or two \
             clear, non-technical sentences based on the data. Be concise and do not repeat \
             the table.\n\
             \n\
             Question: {question}\n\
             Rows returned: {count}{truncation}\n\
             Sample rows (first {shown}):\n\
             {sample_json}\n",
            count = table.rows.len(),
            shown = sample.len(),
        )
    }

    fn syntax_rules(&self) -> &'static str {
        match self.database {
            DatabaseKind::Postgres => {
                "Use PostgreSQL syntax. Quote identifiers with double quotes only when needed."
            }
            DatabaseKind::MySql => {
                "Use MySQL syntax. Use backticks (`) for table and column names, never double \
                 quotes for identifiers. Use schema and column names exactly as they appear."
            }
        }
    }
}
