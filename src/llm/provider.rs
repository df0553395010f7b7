//! Completion provider abstraction.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single completion attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Key missing, invalid or lacking permission (never retried)
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Non-success status other than auth or rate limiting
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not contain an answer
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth(_))
    }

    /// Short class for the `error.kind` span field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::RateLimited(_) => "rate_limited",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Map a non-success HTTP response.
    ///
    /// The body is cut to 500 bytes so an echoed prompt does not end up in
    /// logs or client-facing messages.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = truncate(body.trim(), 500);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(body),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(body),
            _ => Self::Status {
                status: status.as_u16(),
                body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // without_url: the URL may carry a key for some gateways
        let err = err.without_url();
        if err.is_timeout() {
            Self::Transport(format!("timed out: {err}"))
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Text-completion backend.
///
/// Implementations send one prompt and return the generated text; retries,
/// timeouts and concurrency limits live in [`crate::llm::ModelClient`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name (`gen_ai.system`).
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Generate a completion for a single prompt.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` describing the failed attempt
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
