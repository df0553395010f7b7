//! sqlx-backed `QueryBackend` for PostgreSQL and MySQL.
//!
//! Every pooled session is switched to read-only and given a server-side
//! statement timeout as soon as it connects.

use crate::db::decode;
use crate::db::{ColumnInfo, DatabaseKind, QueryBackend};
use crate::otel::{db_span, DbOperation};
use crate::types::{ExecutionCause, ExecutionResult, QueryGenError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Column, Connection, Executor, Row, Statement};
use std::time::Duration;
use tracing::{debug, warn, Instrument};

const PG_SCHEMA_QUERY: &str = "SELECT table_name::text, column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 \
     ORDER BY table_name, ordinal_position";

const MYSQL_SCHEMA_QUERY: &str = "SELECT CAST(table_name AS CHAR), CAST(column_name AS CHAR), CAST(data_type AS CHAR) \
     FROM information_schema.columns \
     WHERE table_schema = DATABASE() \
     ORDER BY table_name, ordinal_position";

/// Pool sizing and session limits.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Server-side statement limit applied to every session
    pub statement_timeout: Duration,
    /// PostgreSQL schema for introspection
    pub pg_schema: String,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(15),
            pg_schema: "public".to_string(),
        }
    }
}

enum DatabasePool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

/// Connection pool for the configured engine.
pub struct SqlxBackend {
    pool: DatabasePool,
    pg_schema: String,
}

impl SqlxBackend {
    /// Create backend with a lazily connecting pool.
    ///
    /// No connection is opened until the first query, so the service starts
    /// while the database is still unreachable.
    ///
    /// # Arguments
    ///
    /// * `kind` - Database engine
    /// * `url` - Connection URL
    /// * `options` - Pool sizing and session limits
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::ConfigError` if the URL does not parse
    pub fn connect_lazy(
        kind: DatabaseKind,
        url: &SecretString,
        options: BackendOptions,
    ) -> Result<Self> {
        let timeout_ms = u64::try_from(options.statement_timeout.as_millis()).unwrap_or(u64::MAX);

        let pool = match kind {
            DatabaseKind::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.acquire_timeout)
                    .after_connect(move |conn, _meta| {
                        Box::pin(async move {
                            sqlx::query("SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY")
                                .execute(&mut *conn)
                                .await?;
                            sqlx::query(&format!("SET statement_timeout = {timeout_ms}"))
                                .execute(&mut *conn)
                                .await?;
                            Ok(())
                        })
                    })
                    .connect_lazy(url.expose_secret())
                    .map_err(|e| QueryGenError::config(format!("invalid DATABASE_URL: {e}")))?;
                DatabasePool::Postgres(pool)
            }
            DatabaseKind::MySql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.acquire_timeout)
                    .after_connect(move |conn, _meta| {
                        Box::pin(async move {
                            sqlx::query("SET SESSION TRANSACTION READ ONLY")
                                .execute(&mut *conn)
                                .await?;
                            sqlx::query(&format!("SET SESSION max_execution_time = {timeout_ms}"))
                                .execute(&mut *conn)
                                .await?;
                            Ok(())
                        })
                    })
                    .connect_lazy(url.expose_secret())
                    .map_err(|e| QueryGenError::config(format!("invalid MYSQLDB_URL: {e}")))?;
                DatabasePool::MySql(pool)
            }
        };

        Ok(Self {
            pool,
            pg_schema: options.pg_schema,
        })
    }
}

#[async_trait]
impl QueryBackend for SqlxBackend {
    fn kind(&self) -> DatabaseKind {
        match self.pool {
            DatabasePool::Postgres(_) => DatabaseKind::Postgres,
            DatabasePool::MySql(_) => DatabaseKind::MySql,
        }
    }

    async fn fetch_rows(&self, sql: &str, max_rows: usize) -> Result<ExecutionResult> {
        // unnamed statement: the validated text never lands in the statement cache
        let (columns, rows, truncated) = match &self.pool {
            DatabasePool::Postgres(pool) => {
                let stream = sqlx::query(sql).persistent(false).fetch(pool);
                let (columns, rows, truncated) =
                    collect_rows(stream, max_rows, decode::pg_row).await?;
                let columns = match columns {
                    Some(columns) => columns,
                    None => self.describe_columns(sql).await,
                };
                (columns, rows, truncated)
            }
            DatabasePool::MySql(pool) => {
                let stream = sqlx::query(sql).persistent(false).fetch(pool);
                let (columns, rows, truncated) =
                    collect_rows(stream, max_rows, decode::mysql_row).await?;
                let columns = match columns {
                    Some(columns) => columns,
                    None => self.describe_columns(sql).await,
                };
                (columns, rows, truncated)
            }
        };

        Ok(ExecutionResult::new(columns, rows, truncated))
    }

    async fn fetch_schema_columns(&self) -> Result<Vec<ColumnInfo>> {
        let kind = self.kind();
        let namespace = match kind {
            DatabaseKind::Postgres => Some(self.pg_schema.as_str()),
            DatabaseKind::MySql => None,
        };
        let span = db_span(kind, DbOperation::Introspect, namespace);

        let rows: Vec<(String, String, String)> = async {
            match &self.pool {
                DatabasePool::Postgres(pool) => {
                    sqlx::query_as::<_, (String, String, String)>(PG_SCHEMA_QUERY)
                        .bind(&self.pg_schema)
                        .fetch_all(pool)
                        .await
                }
                DatabasePool::MySql(pool) => {
                    sqlx::query_as::<_, (String, String, String)>(MYSQL_SCHEMA_QUERY)
                        .fetch_all(pool)
                        .await
                }
            }
        }
        .instrument(span)
        .await
        .map_err(execution_error)?;

        debug!(columns = rows.len(), "Fetched schema columns");

        Ok(rows
            .into_iter()
            .map(|(table, column, data_type)| ColumnInfo::new(table, column, data_type))
            .collect())
    }
}

impl SqlxBackend {
    /// Column names of a statement that returned no rows.
    async fn describe_columns(&self, sql: &str) -> Vec<String> {
        let span = db_span(self.kind(), DbOperation::Describe, None);
        let described = self.describe_uncached(sql).instrument(span).await;

        described.unwrap_or_else(|e| {
            warn!(error = %e, "Could not describe empty result, returning no columns");
            Vec::new()
        })
    }

    /// Prepare on a dedicated connection, then drop its statement cache so
    /// the validated text is not kept prepared.
    async fn describe_uncached(&self, sql: &str) -> std::result::Result<Vec<String>, sqlx::Error> {
        match &self.pool {
            DatabasePool::Postgres(pool) => {
                let mut conn = pool.acquire().await?;
                let columns = (&mut *conn).prepare(sql).await.map(|stmt| names(stmt.columns()));
                conn.clear_cached_statements().await?;
                columns
            }
            DatabasePool::MySql(pool) => {
                let mut conn = pool.acquire().await?;
                let columns = (&mut *conn).prepare(sql).await.map(|stmt| names(stmt.columns()));
                conn.clear_cached_statements().await?;
                columns
            }
        }
    }
}

fn names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Pull at most `max_rows` rows; one extra row is read to detect truncation.
async fn collect_rows<R: Row>(
    mut stream: BoxStream<'_, std::result::Result<R, sqlx::Error>>,
    max_rows: usize,
    decode_row: fn(&R) -> Vec<JsonValue>,
) -> Result<(Option<Vec<String>>, Vec<Vec<JsonValue>>, bool)> {
    let mut columns = None;
    let mut rows = Vec::new();

    while let Some(row) = stream.try_next().await.map_err(execution_error)? {
        if rows.len() == max_rows {
            return Ok((columns, rows, true));
        }
        if columns.is_none() {
            columns = Some(decode::column_names(&row));
        }
        rows.push(decode_row(&row));
    }

    Ok((columns, rows, false))
}

/// Classify a driver error.
pub(crate) fn execution_error(err: sqlx::Error) -> QueryGenError {
    let cause = match &err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            // 57014 query_canceled (statement_timeout); MySQL 3024 has no distinct SQLSTATE
            if code.as_deref() == Some("57014")
                || db.message().contains("maximum statement execution time exceeded")
            {
                ExecutionCause::Timeout
            } else {
                ExecutionCause::Statement
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => ExecutionCause::Connection,
        _ => ExecutionCause::Statement,
    };

    QueryGenError::execution(err.to_string(), cause)
}
