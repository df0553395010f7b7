//! Question-to-results pipeline.
//!
//! question + schema -> prompt -> model -> validator -> executor -> shaper
//!
//! One `Pipeline` is built at startup and shared behind an `Arc`; each call
//! to [`Pipeline::generate`] is independent and owns all of its data.

use crate::config::Settings;
use crate::db::{BackendOptions, DatabaseKind, QueryBackend, SqlxBackend};
use crate::export::CsvExporter;
use crate::llm::{ModelClient, PromptBuilder};
use crate::query::QueryExecutor;
use crate::results::{shape, Summarizer};
use crate::schema::SchemaFetcher;
use crate::sql::SqlValidator;
use crate::types::{GenerationRequest, QueryGenError, ResponsePayload, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest accepted question, characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

static MUTATING_INTENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(insert|update|delete|drop|alter|truncate)\b").unwrap());

/// Shared pipeline handle for request handlers.
pub type AppContext = Arc<Pipeline>;

/// Pipeline limits and switches.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_schema_chars: usize,
    pub query_timeout: Duration,
    pub max_rows: usize,
    pub summary: bool,
    pub intent_guard: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_schema_chars: 50_000,
            query_timeout: Duration::from_secs(15),
            max_rows: 1000,
            summary: true,
            intent_guard: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_schema_chars: settings.max_schema_chars,
            query_timeout: settings.query_timeout(),
            max_rows: settings.max_rows,
            summary: settings.summary,
            intent_guard: settings.intent_guard_enabled(),
        }
    }
}

pub struct Pipeline {
    database: DatabaseKind,
    prompts: PromptBuilder,
    model: Arc<ModelClient>,
    validator: SqlValidator,
    executor: QueryExecutor,
    schema: SchemaFetcher,
    summarizer: Option<Summarizer>,
    intent_guard: bool,
}

impl Pipeline {
    /// Assemble the pipeline from its collaborators.
    ///
    /// # Arguments
    ///
    /// * `backend` - Database backend (its kind selects the SQL dialect)
    /// * `model` - Model client for generation and summaries
    /// * `options` - Limits and switches
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        model: Arc<ModelClient>,
        options: PipelineOptions,
    ) -> Self {
        let database = backend.kind();
        let prompts = PromptBuilder::new(database, options.max_schema_chars);
        let summarizer = options
            .summary
            .then(|| Summarizer::new(Arc::clone(&model), prompts.clone()));

        Self {
            database,
            prompts,
            model,
            validator: SqlValidator::new(database),
            executor: QueryExecutor::new(
                Arc::clone(&backend),
                options.query_timeout,
                options.max_rows,
            ),
            schema: SchemaFetcher::new(backend),
            summarizer,
            intent_guard: options.intent_guard,
        }
    }

    /// Build the production pipeline (sqlx pool + HTTP provider).
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::ConfigError` for missing URLs or keys
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = connect_backend(settings)?;
        let model = Arc::new(ModelClient::from_settings(settings)?);
        Ok(Self::new(
            backend,
            model,
            PipelineOptions::from_settings(settings),
        ))
    }

    pub fn database(&self) -> DatabaseKind {
        self.database
    }

    /// Live schema description of the connected database.
    pub async fn fetch_schema(&self) -> Result<String> {
        self.schema.fetch().await
    }

    /// Answer a question with a validated, executed query.
    ///
    /// # Arguments
    ///
    /// * `question` - Natural language question
    /// * `schema` - Schema description; `None` or blank fetches it live
    ///
    /// # Returns
    ///
    /// `ResponsePayload` with rows, CSV attachment and optional summary
    ///
    /// # Errors
    ///
    /// Any `QueryGenError`; nothing is executed unless the validator
    /// accepted the model output
    pub async fn generate(&self, question: &str, schema: Option<&str>) -> Result<ResponsePayload> {
        let question = validate_question(question)?;
        if self.intent_guard {
            check_intent(question)?;
        }

        let schema = match schema.map(str::trim).filter(|s| !s.is_empty()) {
            Some(provided) => provided.to_string(),
            None => self.schema.fetch().await?,
        };

        let request = GenerationRequest::new(question, schema);
        let prompt = self.prompts.build(&request)?;
        let raw = self.model.complete(&prompt).await?;

        let query = self.validator.validate(raw.as_str()).map_err(|rejection| {
            warn!(
                kind = %rejection.kind,
                detail = %rejection.detail,
                provider = self.model.provider_name(),
                "Rejected model output"
            );
            QueryGenError::from(rejection)
        })?;
        info!(database = %self.database, "Validated generated query");

        let result = self.executor.execute(&query).await?;
        let table = shape(&result);
        let csv = CsvExporter::attachment(&table)?;

        let summary = match &self.summarizer {
            Some(summarizer) => summarizer.summarize(request.question(), &table).await,
            None => None,
        };

        Ok(ResponsePayload {
            sql_query: query.sql_text().to_string(),
            row_count: table.rows.len(),
            results: table.rows,
            columns: table.columns,
            truncated: table.truncated,
            csv_base64: csv.base64,
            csv_filename: csv.filename,
            summary,
        })
    }
}

/// sqlx backend for the configured database.
pub fn connect_backend(settings: &Settings) -> Result<Arc<dyn QueryBackend>> {
    let backend = SqlxBackend::connect_lazy(
        settings.database_type,
        settings.connection_url()?,
        BackendOptions {
            max_connections: settings.db_max_connections,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: settings.query_timeout(),
            pg_schema: settings.pg_schema.clone(),
        },
    )?;
    Ok(Arc::new(backend))
}

/// Trimmed question, 1..=1000 characters.
fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    let chars = trimmed.chars().count();

    if chars == 0 {
        return Err(QueryGenError::InvalidRequest(
            "user_query must not be empty".to_string(),
        ));
    }
    if chars > MAX_QUESTION_CHARS {
        return Err(QueryGenError::InvalidRequest(format!(
            "user_query is {chars} characters, the limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(trimmed)
}

fn check_intent(question: &str) -> Result<()> {
    if let Some(word) = MUTATING_INTENT_REGEX.find(question) {
        warn!(word = word.as_str(), "Blocked question with mutating intent");
        return Err(QueryGenError::MutatingRequest(format!(
            "the question asks to {} data; only read-only questions are supported",
            word.as_str().to_lowercase()
        )));
    }
    Ok(())
}
