//! Retrying, bounded model client.

use crate::config::{ProviderKind, Settings};
use crate::llm::gemini::GeminiProvider;
use crate::llm::openai::OpenAiProvider;
use crate::llm::provider::{CompletionProvider, ProviderError};
use crate::otel::{gen_ai_span, record_gen_ai_error};
use crate::types::{QueryGenError, RawModelOutput, Result};
use rand::Rng;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn, Instrument};

/// First try plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Limits applied around every provider call.
#[derive(Debug, Clone)]
pub struct ModelClientOptions {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Backoff base before the retry
    pub retry_base: Duration,
    /// Concurrent outbound calls
    pub max_concurrency: usize,
}

impl Default for ModelClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_base: Duration::from_millis(500),
            max_concurrency: 8,
        }
    }
}

/// Sends prompts to the configured provider.
pub struct ModelClient {
    provider: Arc<dyn CompletionProvider>,
    options: ModelClientOptions,
    permits: Semaphore,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: ModelClientOptions) -> Self {
        let permits = Semaphore::new(options.max_concurrency.max(1));
        Self {
            provider,
            options,
            permits,
        }
    }

    /// Build the client for the provider selected in settings.
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::ConfigError` if the provider key is missing,
    /// `QueryGenError::InternalError` if the HTTP client cannot be built
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let key = settings.provider_key()?.clone();
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| QueryGenError::InternalError(format!("failed to build HTTP client: {e}")))?;

        let provider: Arc<dyn CompletionProvider> = match settings.provider {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
                http,
                key,
                settings.openai_model.clone(),
                settings.openai_base_url.clone(),
            )),
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(
                http,
                key,
                settings.gemini_model.clone(),
                settings.gemini_base_url.clone(),
            )),
        };

        Ok(Self::new(
            provider,
            ModelClientOptions {
                timeout: settings.model_timeout(),
                retry_base: settings.model_retry_base(),
                max_concurrency: settings.model_max_concurrency,
            },
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate a completion.
    ///
    /// Transient failures get exactly one retry after a jittered backoff;
    /// authentication failures are returned immediately.
    ///
    /// # Arguments
    ///
    /// * `prompt` - Complete prompt text
    ///
    /// # Returns
    ///
    /// Raw model text, untrusted
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::ModelUnavailable` when no attempt succeeded
    pub async fn complete(&self, prompt: &str) -> Result<RawModelOutput> {
        let mut attempt = 1;

        loop {
            let span = gen_ai_span(self.provider.name(), self.provider.model(), attempt);

            match self.attempt(prompt).instrument(span.clone()).await {
                Ok(text) => {
                    debug!(parent: &span, chars = text.len(), "Model call succeeded");
                    return Ok(RawModelOutput::new(text));
                }
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    record_gen_ai_error(&span, e.class());
                    let delay = retry_delay(self.options.retry_base, attempt);
                    warn!(
                        parent: &span,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    record_gen_ai_error(&span, e.class());
                    error!(parent: &span, error = %e, attempts = attempt, "Model call failed");
                    return Err(QueryGenError::ModelUnavailable {
                        provider: self.provider.name().to_string(),
                        cause: e.to_string(),
                    });
                }
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Transport("model client is shut down".to_string()))?;

        tokio::time::timeout(self.options.timeout, self.provider.complete(prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.options.timeout))?
    }
}

/// Exponential backoff with up to 50% jitter.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let delay = base_ms.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
    let jitter = if base_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=base_ms / 2)
    };
    Duration::from_millis(delay.saturating_add(jitter))
}
