//! Query execution.

pub mod executor;

pub use executor::QueryExecutor;
