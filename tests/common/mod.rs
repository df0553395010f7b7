//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use askdb::db::{ColumnInfo, DatabaseKind, QueryBackend};
use askdb::llm::{CompletionProvider, ModelClient, ModelClientOptions, ProviderError};
use askdb::pipeline::{Pipeline, PipelineOptions};
use askdb::types::{ExecutionResult, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CUSTOMERS_SCHEMA: &str =
    "Table: customers\nColumns: id (integer), name (text), city (text)";

/// Backend returning canned rows and recording every executed statement.
pub struct FakeBackend {
    kind: DatabaseKind,
    columns: Vec<String>,
    rows: Vec<Vec<JsonValue>>,
    schema: Vec<ColumnInfo>,
    executed: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            kind: DatabaseKind::Postgres,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            schema: vec![
                ColumnInfo::new("customers", "id", "integer"),
                ColumnInfo::new("customers", "name", "text"),
                ColumnInfo::new("customers", "city", "text"),
            ],
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&["id", "name", "city"], Vec::new())
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    async fn fetch_rows(&self, sql: &str, max_rows: usize) -> Result<ExecutionResult> {
        self.executed.lock().unwrap().push(sql.to_string());
        let truncated = self.rows.len() > max_rows;
        let rows = self.rows.iter().take(max_rows).cloned().collect();
        Ok(ExecutionResult::new(self.columns.clone(), rows, truncated))
    }

    async fn fetch_schema_columns(&self) -> Result<Vec<ColumnInfo>> {
        Ok(self.schema.clone())
    }
}

/// Provider answering from a script, one entry per call.
pub struct FakeProvider {
    script: Mutex<VecDeque<std::result::Result<String, ProviderError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(script: Vec<std::result::Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answers: &[&str]) -> Self {
        Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Malformed("script exhausted".to_string())))
    }
}

pub fn client_options() -> ModelClientOptions {
    ModelClientOptions {
        timeout: Duration::from_secs(30),
        retry_base: Duration::from_millis(10),
        max_concurrency: 4,
    }
}

pub fn build_pipeline(
    backend: Arc<FakeBackend>,
    provider: Arc<FakeProvider>,
    options: PipelineOptions,
) -> Pipeline {
    let model = Arc::new(ModelClient::new(provider, client_options()));
    Pipeline::new(backend, model, options)
}
