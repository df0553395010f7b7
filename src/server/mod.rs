//! HTTP API (axum).

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, GenerateQueryRequest};

use crate::pipeline::AppContext;
use crate::types::{QueryGenError, Result};
use std::net::SocketAddr;
use tracing::info;

/// Serve the API until Ctrl-C.
///
/// In-flight requests finish before the listener closes; a client that
/// disconnects drops its pipeline future, cancelling pending model and
/// database calls.
///
/// # Errors
///
/// Returns `QueryGenError::ConfigError` if the address cannot be bound,
/// `QueryGenError::InternalError` if the server fails
pub async fn serve(context: AppContext, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| QueryGenError::config(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, database = %context.database(), "askdb API listening");

    axum::serve(listener, create_router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| QueryGenError::InternalError(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
