//! HTTP API tests driving the axum router in-process.

mod common;

use askdb::pipeline::PipelineOptions;
use askdb::server::create_router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{build_pipeline, FakeBackend, FakeProvider};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tower::ServiceExt;

fn router(backend: FakeBackend, provider: FakeProvider) -> Router {
    let pipeline = build_pipeline(
        Arc::new(backend),
        Arc::new(provider),
        PipelineOptions::default(),
    );
    create_router(Arc::new(pipeline))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(body: JsonValue) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate-query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_fetch_schema() {
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));
    let request = Request::builder()
        .uri("/fetch-schema")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["schema"],
        json!("Table: customers\nColumns: id (integer), name (text), city (text)")
    );
}

#[tokio::test]
async fn test_generate_query_success() {
    let backend = FakeBackend::new(
        &["id", "city"],
        vec![vec![json!(7), json!("New York")]],
    );
    let provider = FakeProvider::answering(&[
        "SELECT id, city FROM customers WHERE city = 'New York'",
        "One customer lives in New York.",
    ]);
    let app = router(backend, provider);

    let (status, body) = send(
        app,
        post_json(json!({
            "user_query": "Show me all customers from New York",
            "db_schema": "Table: customers\nColumns: id (integer), city (text)"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["sql_query"],
        json!("SELECT id, city FROM customers WHERE city = 'New York'")
    );
    assert_eq!(body["results"], json!([{"id": 7, "city": "New York"}]));
    assert_eq!(body["row_count"], json!(1));
    assert_eq!(body["summary"], json!("One customer lives in New York."));
    assert!(!body["csv_base64"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_forbidden_statement_is_422() {
    let app = router(
        FakeBackend::empty(),
        FakeProvider::answering(&["DELETE FROM orders WHERE id=1"]),
    );

    let (status, body) = send(app, post_json(json!({"user_query": "Which order is first?"}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], json!("forbidden_statement"));
}

#[tokio::test]
async fn test_mutating_question_is_400() {
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));

    let (status, body) = send(app, post_json(json!({"user_query": "drop the orders table"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("mutating_request"));
}

#[tokio::test]
async fn test_empty_question_is_400() {
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));

    let (status, body) = send(app, post_json(json!({"user_query": "   "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("invalid_request"));
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));

    let (status, body) = send(app, post_json(json!({"question": "wrong field"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("invalid_request"));
}

#[tokio::test]
async fn test_model_unavailable_is_502() {
    // Empty script: both attempts fail as malformed
    let app = router(FakeBackend::empty(), FakeProvider::answering(&[]));

    let (status, body) = send(app, post_json(json!({"user_query": "How many customers?"}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], json!("model_unavailable"));
}
