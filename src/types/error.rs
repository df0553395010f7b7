//! Error types for the query generation pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions. Every variant maps to a
//! stable machine-readable [`ErrorKind`] so the HTTP layer and the CLI can
//! report failures without matching on message text.

use crate::scrub::scrub_credentials;
use crate::sql::{Rejection, RejectionKind};
use serde::Serialize;
use thiserror::Error;

/// Why a query execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionCause {
    /// The database rejected the statement (unknown column, syntax, permission)
    Statement,
    /// Statement exceeded the execution timeout
    Timeout,
    /// Pool exhausted or connection lost
    Connection,
}

/// Machine-readable error kind (serialized as snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    MutatingRequest,
    SchemaTooLarge,
    ModelUnavailable,
    NoStatementFound,
    MultipleStatements,
    ForbiddenStatement,
    ExecutionError,
    Configuration,
    Internal,
}

impl ErrorKind {
    /// Get kind as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::MutatingRequest => "mutating_request",
            Self::SchemaTooLarge => "schema_too_large",
            Self::ModelUnavailable => "model_unavailable",
            Self::NoStatementFound => "no_statement_found",
            Self::MultipleStatements => "multiple_statements",
            Self::ForbiddenStatement => "forbidden_statement",
            Self::ExecutionError => "execution_error",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

/// Error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum QueryGenError {
    /// Request body failed basic validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Question asks for a data or schema change
    #[error("Only read-only questions are supported: {0}")]
    MutatingRequest(String),

    /// Schema description exceeds the prompt budget
    #[error("Schema description is {actual} characters, the limit is {max}")]
    SchemaTooLarge { actual: usize, max: usize },

    /// Model provider failed after the retry budget
    #[error("Model provider '{provider}' unavailable: {cause}")]
    ModelUnavailable { provider: String, cause: String },

    /// Model output holds no recognisable SQL statement
    #[error("No SQL statement found: {0}")]
    NoStatementFound(String),

    /// Model output holds more than one statement
    #[error("Multiple SQL statements: {0}")]
    MultipleStatements(String),

    /// Statement is not a read-only SELECT
    #[error("Forbidden statement: {0}")]
    ForbiddenStatement(String),

    /// Database reported an error while running the statement
    #[error("Query execution failed: {message}")]
    Execution {
        message: String,
        cause: ExecutionCause,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl QueryGenError {
    /// Create an execution error with the credential fragments removed.
    ///
    /// # Arguments
    ///
    /// * `message` - Message reported by the database driver
    /// * `cause` - Failure class
    ///
    /// # Returns
    ///
    /// `QueryGenError::Execution`
    pub fn execution(message: impl AsRef<str>, cause: ExecutionCause) -> Self {
        Self::Execution {
            message: scrub_credentials(message.as_ref()),
            cause,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::MutatingRequest(_) => ErrorKind::MutatingRequest,
            Self::SchemaTooLarge { .. } => ErrorKind::SchemaTooLarge,
            Self::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            Self::NoStatementFound(_) => ErrorKind::NoStatementFound,
            Self::MultipleStatements(_) => ErrorKind::MultipleStatements,
            Self::ForbiddenStatement(_) => ErrorKind::ForbiddenStatement,
            Self::Execution { .. } => ErrorKind::ExecutionError,
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Check if error comes from an upstream dependency rather than the input.
    ///
    /// # Returns
    ///
    /// `true` for provider outages and database timeouts/connection loss,
    /// `false` for anything caused by the request or the generated SQL
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. }
                | Self::Execution {
                    cause: ExecutionCause::Timeout | ExecutionCause::Connection,
                    ..
                }
        )
    }
}

impl From<Rejection> for QueryGenError {
    fn from(rejection: Rejection) -> Self {
        match rejection.kind {
            RejectionKind::NoStatementFound => Self::NoStatementFound(rejection.detail),
            RejectionKind::MultipleStatements => Self::MultipleStatements(rejection.detail),
            RejectionKind::ForbiddenStatement => Self::ForbiddenStatement(rejection.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_conversion_keeps_kind() {
        let err: QueryGenError = Rejection::new(RejectionKind::ForbiddenStatement, "DROP").into();
        assert_eq!(err.kind(), ErrorKind::ForbiddenStatement);
        assert_eq!(err.to_string(), "Forbidden statement: DROP");
    }

    #[test]
    fn test_execution_error_is_scrubbed() {
        let err = QueryGenError::execution(
            "connect to postgres://app:hunter2@db:5432/shop failed",
            ExecutionCause::Connection,
        );
        assert!(!err.to_string().contains("hunter2"));
        assert!(err.is_upstream());
    }

    #[test]
    fn test_statement_errors_are_not_upstream() {
        let err = QueryGenError::execution("column \"cty\" does not exist", ExecutionCause::Statement);
        assert!(!err.is_upstream());
        assert_eq!(err.kind().as_str(), "execution_error");
    }
}
