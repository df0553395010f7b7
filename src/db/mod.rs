//! Database access.
//!
//! The pipeline talks to the database only through [`QueryBackend`]; the
//! sqlx implementation lives in [`pool`], value coercion in [`decode`].

pub mod decode;
pub mod pool;

pub use pool::{BackendOptions, SqlxBackend};

use crate::types::{ExecutionResult, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use std::fmt;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[value(name = "postgresql", alias = "postgres")]
    #[serde(rename = "postgresql")]
    Postgres,
    #[value(name = "mysql")]
    MySql,
}

impl DatabaseKind {
    /// Value for the `db.system.name` span attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
        }
    }

    /// Name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
        }
    }

    /// sqlparser dialect used to tokenize and parse generated SQL.
    pub fn sql_dialect(&self) -> Box<dyn Dialect> {
        match self {
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::MySql => Box::new(MySqlDialect {}),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub table: String,
    pub column: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
        }
    }
}

/// Read access to the configured database.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Engine behind this backend.
    fn kind(&self) -> DatabaseKind;

    /// Run a statement and materialize at most `max_rows` rows.
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement text, sent verbatim
    /// * `max_rows` - Row cap; `truncated` is set when more rows exist
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::Execution` classified as statement, timeout or
    /// connection failure
    async fn fetch_rows(&self, sql: &str, max_rows: usize) -> Result<ExecutionResult>;

    /// Columns of every table in the inspected schema, ordered by table
    /// name then ordinal position.
    async fn fetch_schema_columns(&self) -> Result<Vec<ColumnInfo>>;
}
