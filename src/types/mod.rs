//! Core data types for the query pipeline.
//!
//! - `GenerationRequest`: question + schema handed to the prompt builder
//! - `RawModelOutput`: untrusted text returned by a provider
//! - `ExecutionResult`: rows materialized by the executor
//! - `ResponsePayload`: what the API returns
//! - `QueryGenError`: error type for all operations

pub mod error;
pub mod request;
pub mod response;

pub use error::{ErrorKind, ExecutionCause, QueryGenError};
pub use request::{GenerationRequest, RawModelOutput};
pub use response::{ExecutionResult, ResponsePayload};

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, QueryGenError>;
