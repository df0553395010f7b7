//! End-to-end pipeline scenarios against in-memory fakes.

mod common;

use askdb::llm::ProviderError;
use askdb::pipeline::PipelineOptions;
use askdb::results::NO_RESULTS_SUMMARY;
use askdb::types::QueryGenError;
use base64::Engine;
use common::{build_pipeline, FakeBackend, FakeProvider, CUSTOMERS_SCHEMA};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn new_york_rows() -> Vec<Vec<serde_json::Value>> {
    vec![
        vec![json!(1), json!("Ada"), json!("New York")],
        vec![json!(2), json!("Grace"), json!("New York")],
    ]
}

#[tokio::test]
async fn test_customers_from_new_york() {
    let backend = Arc::new(FakeBackend::new(&["id", "name", "city"], new_york_rows()));
    let provider = Arc::new(FakeProvider::answering(&[
        "```sql\nSELECT * FROM customers WHERE city = 'New York';\n```",
        "Two customers live in New York.",
    ]));
    let pipeline = build_pipeline(backend.clone(), provider.clone(), PipelineOptions::default());

    let payload = pipeline
        .generate("Show me all customers from New York", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert_eq!(
        payload.sql_query,
        "SELECT * FROM customers WHERE city = 'New York'"
    );
    assert_eq!(backend.executed(), vec![payload.sql_query.clone()]);
    assert_eq!(payload.row_count, 2);
    assert_eq!(payload.columns, vec!["id", "name", "city"]);
    assert_eq!(payload.results[0]["name"], json!("Ada"));
    assert!(!payload.truncated);
    assert_eq!(
        payload.summary.as_deref(),
        Some("Two customers live in New York.")
    );

    assert!(!payload.csv_base64.is_empty());
    assert!(payload.csv_filename.starts_with("result_"));
    assert!(payload.csv_filename.ends_with(".csv"));
    let csv = base64::engine::general_purpose::STANDARD
        .decode(&payload.csv_base64)
        .unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("id,name,city"));
    assert!(csv.contains("Grace"));

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains(CUSTOMERS_SCHEMA));
    assert!(prompt.contains("Show me all customers from New York"));
}

#[tokio::test]
async fn test_stacked_drop_is_never_executed() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&[
        "SELECT * FROM users; DROP TABLE users;",
    ]));
    let pipeline = build_pipeline(backend.clone(), provider, PipelineOptions::default());

    let err = pipeline
        .generate("List all users", Some("Table: users\nColumns: id (integer)"))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryGenError::MultipleStatements(_)));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_statement_before_fence_is_never_executed() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&[
        "SELECT * FROM users; DROP TABLE users;\n```sql\nSELECT 1\n```",
    ]));
    let pipeline = build_pipeline(backend.clone(), provider, PipelineOptions::default());

    let err = pipeline
        .generate("List all users", Some("Table: users\nColumns: id (integer)"))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryGenError::MultipleStatements(_)));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_delete_is_never_executed() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&["DELETE FROM orders WHERE id=1"]));
    let pipeline = build_pipeline(backend.clone(), provider, PipelineOptions::default());

    let err = pipeline
        .generate(
            "Which order has id 1?",
            Some("Table: orders\nColumns: id (integer)"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, QueryGenError::ForbiddenStatement(_)));
    assert!(backend.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout_twice_is_unavailable() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(
        FakeProvider::answering(&["SELECT 1", "SELECT 1"]).with_delay(Duration::from_secs(60)),
    );
    let pipeline = build_pipeline(backend.clone(), provider.clone(), PipelineOptions::default());

    let err = pipeline
        .generate("How many customers are there?", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap_err();

    match err {
        QueryGenError::ModelUnavailable { provider: name, .. } => assert_eq!(name, "fake"),
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
    assert_eq!(provider.calls(), 2);
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_zero_rows_is_not_an_error() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&[
        "SELECT * FROM customers WHERE city = 'Atlantis'",
    ]));
    let pipeline = build_pipeline(backend, provider.clone(), PipelineOptions::default());

    let payload = pipeline
        .generate("Show me all customers from Atlantis", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert!(payload.results.is_empty());
    assert_eq!(payload.row_count, 0);
    assert_eq!(payload.summary.as_deref(), Some(NO_RESULTS_SUMMARY));
    // No summary call for an empty table
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_summary_failure_omits_summary() {
    let backend = Arc::new(FakeBackend::new(&["id", "name", "city"], new_york_rows()));
    let provider = Arc::new(FakeProvider::new(vec![
        Ok("SELECT * FROM customers".to_string()),
        Err(ProviderError::Auth("key revoked".to_string())),
    ]));
    let pipeline = build_pipeline(backend, provider.clone(), PipelineOptions::default());

    let payload = pipeline
        .generate("Show me all customers", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert_eq!(payload.row_count, 2);
    assert!(payload.summary.is_none());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_summary_disabled() {
    let backend = Arc::new(FakeBackend::new(&["id", "name", "city"], new_york_rows()));
    let provider = Arc::new(FakeProvider::answering(&["SELECT * FROM customers"]));
    let options = PipelineOptions {
        summary: false,
        ..PipelineOptions::default()
    };
    let pipeline = build_pipeline(backend, provider.clone(), options);

    let payload = pipeline
        .generate("Show me all customers", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert!(payload.summary.is_none());
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_mutating_question_refused_before_model_call() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&["SELECT 1"]));
    let pipeline = build_pipeline(backend, provider.clone(), PipelineOptions::default());

    let err = pipeline
        .generate("Delete every customer in Boston", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap_err();

    assert!(matches!(err, QueryGenError::MutatingRequest(_)));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_intent_guard_can_be_disabled() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&[
        "SELECT * FROM customers WHERE name = 'Drop Bear'",
    ]));
    let options = PipelineOptions {
        intent_guard: false,
        ..PipelineOptions::default()
    };
    let pipeline = build_pipeline(backend.clone(), provider, options);

    let payload = pipeline
        .generate("Find the customer called Drop Bear", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert_eq!(backend.executed().len(), 1);
    assert_eq!(payload.row_count, 0);
}

#[tokio::test]
async fn test_missing_schema_is_fetched_live() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&["SELECT city FROM customers"]));
    let pipeline = build_pipeline(backend, provider.clone(), PipelineOptions::default());

    pipeline
        .generate("Which cities do customers live in?", Some("   "))
        .await
        .unwrap();

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("Table: customers\nColumns: id (integer), name (text), city (text)"));
}

#[tokio::test]
async fn test_oversized_schema_rejected_before_model_call() {
    let backend = Arc::new(FakeBackend::empty());
    let provider = Arc::new(FakeProvider::answering(&["SELECT 1"]));
    let options = PipelineOptions {
        max_schema_chars: 20,
        ..PipelineOptions::default()
    };
    let pipeline = build_pipeline(backend, provider.clone(), options);

    let err = pipeline
        .generate("How many customers?", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap_err();

    match err {
        QueryGenError::SchemaTooLarge { actual, max } => {
            assert_eq!(actual, CUSTOMERS_SCHEMA.chars().count());
            assert_eq!(max, 20);
        }
        other => panic!("expected SchemaTooLarge, got {other:?}"),
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_row_cap_marks_truncation() {
    let rows = (0..5).map(|i| vec![json!(i)]).collect();
    let backend = Arc::new(FakeBackend::new(&["id"], rows));
    let provider = Arc::new(FakeProvider::answering(&["SELECT id FROM customers", "Ids."]));
    let options = PipelineOptions {
        max_rows: 3,
        ..PipelineOptions::default()
    };
    let pipeline = build_pipeline(backend, provider, options);

    let payload = pipeline
        .generate("List customer ids", Some(CUSTOMERS_SCHEMA))
        .await
        .unwrap();

    assert_eq!(payload.row_count, 3);
    assert!(payload.truncated);
}
