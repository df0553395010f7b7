//! Service configuration.
//!
//! Every setting is a long flag with an environment variable fallback, so the
//! same struct serves `askdb serve --max-rows 50` and a `.env` driven
//! deployment. Secrets (API keys, connection URLs) are parsed straight into
//! `SecretString` and never appear in `Debug` output.

use crate::db::DatabaseKind;
use crate::llm::{gemini, openai};
use crate::types::{QueryGenError, Result};
use clap::{ArgAction, Args, Parser, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use std::time::Duration;

/// Completion provider selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "gemini")]
    Gemini,
}

impl ProviderKind {
    /// Value for the `gen_ai.system` span attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

fn parse_secret(value: &str) -> std::result::Result<SecretString, std::convert::Infallible> {
    Ok(SecretString::from(value.to_string()))
}

/// Immutable service settings.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Database engine
    #[arg(long, env = "DATABASE_TYPE", value_enum, default_value = "postgresql")]
    pub database_type: DatabaseKind,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, value_parser = parse_secret)]
    pub database_url: Option<SecretString>,

    /// MySQL connection URL (preferred over DATABASE_URL for mysql)
    #[arg(long, env = "MYSQLDB_URL", hide_env_values = true, value_parser = parse_secret)]
    pub mysql_url: Option<SecretString>,

    /// PostgreSQL schema inspected for the live schema description
    #[arg(long, env = "ASKDB_PG_SCHEMA", default_value = "public")]
    pub pg_schema: String,

    /// Completion provider
    #[arg(long, env = "MODEL_PROVIDER", value_enum, default_value = "openai")]
    pub provider: ProviderKind,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, value_parser = parse_secret)]
    pub openai_api_key: Option<SecretString>,

    #[arg(long, env = "OPENAI_MODEL", default_value = openai::DEFAULT_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = openai::DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_parser = parse_secret)]
    pub gemini_api_key: Option<SecretString>,

    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = gemini::DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Timeout per model attempt, seconds
    #[arg(long, env = "ASKDB_MODEL_TIMEOUT_SECS", default_value_t = 30)]
    pub model_timeout_secs: u64,

    /// Base delay before the single model retry, milliseconds
    #[arg(long, env = "ASKDB_MODEL_RETRY_BASE_MS", default_value_t = 500)]
    pub model_retry_base_ms: u64,

    /// Concurrent outbound model calls
    #[arg(long, env = "ASKDB_MODEL_MAX_CONCURRENCY", default_value_t = 8)]
    pub model_max_concurrency: usize,

    /// Query execution timeout, seconds
    #[arg(long, env = "ASKDB_QUERY_TIMEOUT_SECS", default_value_t = 15)]
    pub query_timeout_secs: u64,

    /// Row cap per query
    #[arg(long, env = "ASKDB_MAX_ROWS", default_value_t = 1000)]
    pub max_rows: usize,

    /// Largest schema description accepted, characters
    #[arg(long, env = "ASKDB_MAX_SCHEMA_CHARS", default_value_t = 50_000)]
    pub max_schema_chars: usize,

    #[arg(long, env = "ASKDB_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    /// Ask the model for a natural-language summary of the rows
    #[arg(long, env = "ASKDB_SUMMARY", default_value_t = true, action = ArgAction::Set)]
    pub summary: bool,

    /// Refuse questions that ask to modify data
    #[arg(long, env = "ASKDB_INTENT_GUARD", default_value_t = true, action = ArgAction::Set)]
    pub intent_guard: bool,

    /// Shorthand for `--intent-guard false`
    #[arg(long)]
    pub no_intent_guard: bool,

    #[arg(long, env = "ASKDB_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: SocketAddr,

    #[arg(long, env = "ASKDB_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// OTLP collector endpoint (requires the `otlp` feature)
    #[arg(long, env = "ASKDB_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Parser)]
#[command(name = "askdb")]
struct EnvSettings {
    #[command(flatten)]
    settings: Settings,
}

impl Settings {
    /// Load settings from `.env` and the process environment only.
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::ConfigError` if a variable does not parse or
    /// the result fails [`Settings::validate`]
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let parsed = EnvSettings::try_parse_from(["askdb"])
            .map_err(|e| QueryGenError::config(e.to_string()))?;
        parsed.settings.validate()?;
        Ok(parsed.settings)
    }

    /// Check cross-field consistency.
    ///
    /// Only the selected provider's key is required.
    pub fn validate(&self) -> Result<()> {
        self.connection_url()?;
        self.provider_key()?;

        if self.model_timeout_secs == 0 || self.query_timeout_secs == 0 {
            return Err(QueryGenError::config("timeouts must be greater than zero"));
        }
        if self.max_rows == 0 {
            return Err(QueryGenError::config("ASKDB_MAX_ROWS must be greater than zero"));
        }
        if self.model_max_concurrency == 0 || self.db_max_connections == 0 {
            return Err(QueryGenError::config(
                "concurrency and pool limits must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Connection URL for the configured engine.
    pub fn connection_url(&self) -> Result<&SecretString> {
        let url = match self.database_type {
            DatabaseKind::MySql => self.mysql_url.as_ref().or(self.database_url.as_ref()),
            DatabaseKind::Postgres => self.database_url.as_ref(),
        };

        url.filter(|u| !u.expose_secret().trim().is_empty())
            .ok_or_else(|| match self.database_type {
                DatabaseKind::MySql => {
                    QueryGenError::config("MYSQLDB_URL or DATABASE_URL must be set for mysql")
                }
                DatabaseKind::Postgres => {
                    QueryGenError::config("DATABASE_URL must be set for postgresql")
                }
            })
    }

    /// API key of the selected provider.
    pub fn provider_key(&self) -> Result<&SecretString> {
        let (key, var) = match self.provider {
            ProviderKind::OpenAi => (self.openai_api_key.as_ref(), "OPENAI_API_KEY"),
            ProviderKind::Gemini => (self.gemini_api_key.as_ref(), "GEMINI_API_KEY"),
        };

        key.filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                QueryGenError::config(format!(
                    "{var} must be set when MODEL_PROVIDER={}",
                    self.provider.as_str()
                ))
            })
    }

    pub fn intent_guard_enabled(&self) -> bool {
        self.intent_guard && !self.no_intent_guard
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn model_retry_base(&self) -> Duration {
        Duration::from_millis(self.model_retry_base_ms)
    }
}
