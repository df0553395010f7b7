//! Provider wire-format contracts against a mock HTTP server.

use askdb::llm::{
    CompletionProvider, GeminiProvider, ModelClient, ModelClientOptions, OpenAiProvider,
    ProviderError,
};
use askdb::types::QueryGenError;
use reqwest::Client;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        Client::new(),
        SecretString::from("sk-test".to_string()),
        "gpt-4o".to_string(),
        server.uri(),
    )
}

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(
        Client::new(),
        SecretString::from("g-test".to_string()),
        "gemini-2.0-flash".to_string(),
        server.uri(),
    )
}

fn fast_retry() -> ModelClientOptions {
    ModelClientOptions {
        timeout: Duration::from_secs(5),
        retry_base: Duration::from_millis(1),
        max_concurrency: 2,
    }
}

#[tokio::test]
async fn test_openai_request_and_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "system", "content": "count users"}],
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  SELECT COUNT(*) FROM users\n"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = openai(&server).complete("count users").await.unwrap();
    assert_eq!(answer, "SELECT COUNT(*) FROM users");
}

#[tokio::test]
async fn test_openai_unauthorized_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided"}
        })))
        .mount(&server)
        .await;

    let err = openai(&server).complete("count users").await.unwrap_err();
    assert!(matches!(err, ProviderError::Auth(_)));
}

#[tokio::test]
async fn test_openai_empty_choices_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = openai(&server).complete("count users").await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn test_gemini_request_and_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .and(body_partial_json(json!({
            "contents": [{"parts": [{"text": "count users"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": "SELECT COUNT(*) "}, {"text": "FROM users"}]}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let answer = gemini(&server).complete("count users").await.unwrap();
    assert_eq!(answer, "SELECT COUNT(*) FROM users");

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].url.as_str().contains("g-test"));
}

#[tokio::test]
async fn test_gemini_invalid_key_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{"reason": "API_KEY_INVALID"}]
            }
        })))
        .mount(&server)
        .await;

    let err = gemini(&server).complete("count users").await.unwrap_err();
    assert!(matches!(err, ProviderError::Auth(_)));
}

#[tokio::test]
async fn test_client_retries_server_error_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "SELECT 1"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(Arc::new(openai(&server)), fast_retry());
    let output = client.complete("anything").await.unwrap();
    assert_eq!(output.as_str(), "SELECT 1");
}

#[tokio::test]
async fn test_client_does_not_retry_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(Arc::new(openai(&server)), fast_retry());
    let err = client.complete("anything").await.unwrap_err();

    match err {
        QueryGenError::ModelUnavailable { provider, .. } => assert_eq!(provider, "openai"),
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
}
