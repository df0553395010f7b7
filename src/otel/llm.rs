//! Model call instrumentation (OpenTelemetry `gen_ai` conventions).

use tracing::{field, span, Level, Span};

/// Span for one completion attempt.
///
/// # Arguments
///
/// * `system` - Provider name (`openai`, `gemini`)
/// * `model` - Requested model
/// * `attempt` - 1 for the first try, 2 for the retry
pub fn gen_ai_span(system: &str, model: &str, attempt: u32) -> Span {
    span!(
        Level::INFO,
        "gen_ai.client",
        otel.name = %format!("chat {model}"),
        otel.kind = "client",
        gen_ai.operation.name = "chat",
        gen_ai.system = system,
        gen_ai.request.model = model,
        gen_ai.attempt = attempt,
        error.kind = field::Empty,
    )
}

/// Mark the span failed with a short error class.
pub fn record_gen_ai_error(span: &Span, error_type: &str) {
    span.record("error.kind", error_type);
}
