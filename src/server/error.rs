//! HTTP mapping for pipeline errors.

use crate::types::{ExecutionCause, QueryGenError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// Error response: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError(pub QueryGenError);

impl From<QueryGenError> for ApiError {
    fn from(err: QueryGenError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            QueryGenError::InvalidRequest(_) | QueryGenError::MutatingRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            QueryGenError::SchemaTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            QueryGenError::NoStatementFound(_)
            | QueryGenError::MultipleStatements(_)
            | QueryGenError::ForbiddenStatement(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryGenError::Execution { cause, .. } => match cause {
                ExecutionCause::Statement => StatusCode::BAD_REQUEST,
                ExecutionCause::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ExecutionCause::Connection => StatusCode::SERVICE_UNAVAILABLE,
            },
            QueryGenError::ModelUnavailable { .. } => StatusCode::BAD_GATEWAY,
            QueryGenError::ConfigError(_) | QueryGenError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_upstream() {
            warn!(status = status.as_u16(), error = %self.0, "Upstream dependency failed");
        } else if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }

        let body = json!({
            "error": {
                "kind": self.0.kind().as_str(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
