//! Schema introspection.

pub mod fetcher;

pub use fetcher::{render_schema, SchemaFetcher};
