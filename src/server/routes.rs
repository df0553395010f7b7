//! API routes.

use crate::pipeline::AppContext;
use crate::server::error::ApiError;
use crate::types::{QueryGenError, ResponsePayload};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

/// `POST /generate-query` body.
#[derive(Debug, Deserialize)]
pub struct GenerateQueryRequest {
    pub user_query: String,
    #[serde(default)]
    pub db_schema: Option<String>,
}

pub fn create_router(context: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fetch-schema", get(fetch_schema))
        .route("/generate-query", post(generate_query))
        .with_state(context)
}

async fn health() -> Json<JsonValue> {
    Json(json!({"status": "healthy"}))
}

async fn fetch_schema(State(context): State<AppContext>) -> Result<Json<JsonValue>, ApiError> {
    let schema = context.fetch_schema().await?;
    Ok(Json(json!({"schema": schema})))
}

async fn generate_query(
    State(context): State<AppContext>,
    body: Result<Json<GenerateQueryRequest>, JsonRejection>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let Json(request) =
        body.map_err(|e| QueryGenError::InvalidRequest(e.body_text()))?;

    let payload = context
        .generate(&request.user_query, request.db_schema.as_deref())
        .await?;

    info!(
        rows = payload.row_count,
        truncated = payload.truncated,
        summary = payload.summary.is_some(),
        "Generated query answered"
    );
    Ok(Json(payload))
}
