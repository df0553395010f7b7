//! Live schema description.

use crate::db::{ColumnInfo, QueryBackend};
use crate::types::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Introspects the connected database and renders the schema text given to
/// the model.
pub struct SchemaFetcher {
    backend: Arc<dyn QueryBackend>,
}

impl SchemaFetcher {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    /// Fetch and render the current schema.
    ///
    /// # Returns
    ///
    /// Schema description, empty when the database has no tables
    ///
    /// # Errors
    ///
    /// Returns `QueryGenError::Execution` if introspection fails
    pub async fn fetch(&self) -> Result<String> {
        let columns = self.backend.fetch_schema_columns().await?;
        let rendered = render_schema(&columns);

        if rendered.is_empty() {
            warn!(database = %self.backend.kind(), "Schema introspection found no tables");
        } else {
            info!(
                database = %self.backend.kind(),
                columns = columns.len(),
                chars = rendered.chars().count(),
                "Fetched live schema"
            );
        }

        Ok(rendered)
    }
}

/// Render columns as one block per table:
///
/// ```text
/// Table: customers
/// Columns: id (integer), city (text)
/// ```
///
/// Tables in name order, columns in input order, blocks separated by a blank
/// line.
pub fn render_schema(columns: &[ColumnInfo]) -> String {
    let mut tables: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for info in columns {
        tables
            .entry(info.table.as_str())
            .or_default()
            .push(format!("{} ({})", info.column, info.data_type));
    }

    tables
        .into_iter()
        .map(|(table, cols)| format!("Table: {table}\nColumns: {}", cols.join(", ")))
        .collect::<Vec<_>>()
        .join("\n\n")
}
