//! Row shaping for the API response.

use crate::types::ExecutionResult;
use serde_json::{Map, Value as JsonValue};

/// Rows as ordered JSON objects, ready for serialization and export.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedTable {
    /// Column order, by first appearance across all rows
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, JsonValue>>,
    pub truncated: bool,
}

/// Shape executor rows.
///
/// JSON-object cells are flattened into dotted keys (`address.city`), so one
/// source column may become several output columns. Arrays stay as values.
pub fn shape(result: &ExecutionResult) -> ShapedTable {
    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(result.row_count());

    for values in result.rows() {
        let mut row = Map::new();
        for (name, value) in result.columns().iter().zip(values) {
            flatten_into(&mut row, name, value);
        }
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        columns = result.columns().to_vec();
    }

    ShapedTable {
        columns,
        rows,
        truncated: result.is_truncated(),
    }
}

fn flatten_into(row: &mut Map<String, JsonValue>, key: &str, value: &JsonValue) {
    match value {
        JsonValue::Object(fields) if !fields.is_empty() => {
            for (field, nested) in fields {
                flatten_into(row, &format!("{key}.{field}"), nested);
            }
        }
        other => {
            row.insert(key.to_string(), other.clone());
        }
    }
}
