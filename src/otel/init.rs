//! Subscriber setup.
//!
//! Console output through `tracing-subscriber` (pretty or JSON) filtered by
//! `RUST_LOG`, plus an OTLP export layer when built with the `otlp` feature.

use crate::config::LogFormat;
use crate::types::{QueryGenError, Result};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[cfg(feature = "otlp")]
use {
    opentelemetry::trace::TracerProvider as _, opentelemetry::KeyValue,
    opentelemetry_otlp::WithExportConfig,
    opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider, opentelemetry_sdk::Resource,
    tracing_opentelemetry::OpenTelemetryLayer,
};

const SERVICE_NAME: &str = "askdb";

/// Install the global subscriber.
///
/// # Arguments
///
/// * `format` - Console format
/// * `otlp_endpoint` - Collector endpoint; ignored without the `otlp` feature
///
/// # Errors
///
/// Returns `QueryGenError::ConfigError` if a subscriber is already installed
/// or the exporter cannot be built
pub fn init_tracing(format: LogFormat, otlp_endpoint: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
    };

    let otlp: Option<Box<dyn Layer<Registry> + Send + Sync>> = match otlp_endpoint {
        Some(endpoint) => Some(otlp_layer(endpoint)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(otlp)
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| QueryGenError::config(format!("failed to install tracing subscriber: {e}")))
}

#[cfg(feature = "otlp")]
fn otlp_layer<S>(endpoint: &str) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| QueryGenError::config(format!("failed to build OTLP exporter: {e}")))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            SERVICE_NAME,
        )]))
        .build();

    let tracer = provider.tracer(SERVICE_NAME);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Box::new(OpenTelemetryLayer::new(tracer)))
}

#[cfg(not(feature = "otlp"))]
fn otlp_layer<S>(endpoint: &str) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    eprintln!("{SERVICE_NAME}: OTLP endpoint {endpoint} ignored, built without the `otlp` feature");
    Ok(Box::new(tracing_subscriber::layer::Identity::new()))
}

/// Flush pending spans.
pub fn shutdown_tracing() {
    #[cfg(feature = "otlp")]
    opentelemetry::global::shutdown_tracer_provider();
}
