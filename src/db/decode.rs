//! Row value coercion to JSON.
//!
//! Dispatches on the column's reported type name. Anything that fails to
//! decode becomes `null` instead of failing the whole result.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};
use uuid::Uuid;

/// Column names of a row, in select-list order.
pub fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Decode a PostgreSQL row.
pub fn pg_row(row: &PgRow) -> Vec<JsonValue> {
    row.columns()
        .iter()
        .map(|col| pg_value(row, col.ordinal(), col.type_info().name()))
        .collect()
}

/// Decode a MySQL row.
pub fn mysql_row(row: &MySqlRow) -> Vec<JsonValue> {
    row.columns()
        .iter()
        .map(|col| mysql_value(row, col.ordinal(), col.type_info().name()))
        .collect()
}

fn pg_value(row: &PgRow, i: usize, type_name: &str) -> JsonValue {
    let value = match type_name {
        "BOOL" => get::<_, bool>(row, i).map(JsonValue::Bool),
        "INT2" => get::<_, i16>(row, i).map(|v| json!(v)),
        "INT4" => get::<_, i32>(row, i).map(|v| json!(v)),
        "INT8" => get::<_, i64>(row, i).map(|v| json!(v)),
        "FLOAT4" => get::<_, f32>(row, i).map(|v| float(f64::from(v))),
        "FLOAT8" => get::<_, f64>(row, i).map(float),
        "NUMERIC" => get::<_, Decimal>(row, i).map(decimal),
        "UUID" => get::<_, Uuid>(row, i).map(|v| JsonValue::String(v.to_string())),
        "DATE" => get::<_, NaiveDate>(row, i).map(|v| JsonValue::String(v.to_string())),
        "TIME" => get::<_, NaiveTime>(row, i).map(|v| JsonValue::String(v.to_string())),
        "TIMESTAMP" => {
            get::<_, NaiveDateTime>(row, i).map(|v| JsonValue::String(v.to_string()))
        }
        "TIMESTAMPTZ" => {
            get::<_, DateTime<Utc>>(row, i).map(|v| JsonValue::String(v.to_rfc3339()))
        }
        "JSON" | "JSONB" => get::<_, JsonValue>(row, i),
        "BYTEA" => get::<_, Vec<u8>>(row, i).map(|v| JsonValue::String(STANDARD.encode(v))),
        _ => text(row, i),
    };
    value.unwrap_or(JsonValue::Null)
}

fn mysql_value(row: &MySqlRow, i: usize, type_name: &str) -> JsonValue {
    let value = match type_name {
        "BOOLEAN" => get::<_, bool>(row, i).map(JsonValue::Bool),
        "TINYINT" => get::<_, i8>(row, i).map(|v| json!(v)),
        "SMALLINT" => get::<_, i16>(row, i).map(|v| json!(v)),
        "INT" | "MEDIUMINT" => get::<_, i32>(row, i).map(|v| json!(v)),
        "BIGINT" => get::<_, i64>(row, i).map(|v| json!(v)),
        "TINYINT UNSIGNED" => get::<_, u8>(row, i).map(|v| json!(v)),
        "SMALLINT UNSIGNED" => get::<_, u16>(row, i).map(|v| json!(v)),
        "INT UNSIGNED" | "MEDIUMINT UNSIGNED" => get::<_, u32>(row, i).map(|v| json!(v)),
        "BIGINT UNSIGNED" => get::<_, u64>(row, i).map(|v| json!(v)),
        "FLOAT" => get::<_, f32>(row, i).map(|v| float(f64::from(v))),
        "DOUBLE" => get::<_, f64>(row, i).map(float),
        "DECIMAL" => get::<_, Decimal>(row, i).map(decimal),
        "DATE" => get::<_, NaiveDate>(row, i).map(|v| JsonValue::String(v.to_string())),
        "TIME" => get::<_, NaiveTime>(row, i).map(|v| JsonValue::String(v.to_string())),
        "DATETIME" => {
            get::<_, NaiveDateTime>(row, i).map(|v| JsonValue::String(v.to_string()))
        }
        "TIMESTAMP" => {
            get::<_, DateTime<Utc>>(row, i).map(|v| JsonValue::String(v.to_rfc3339()))
        }
        "JSON" => get::<_, JsonValue>(row, i),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            get::<_, Vec<u8>>(row, i).map(|v| JsonValue::String(STANDARD.encode(v)))
        }
        _ => text(row, i),
    };
    value.unwrap_or(JsonValue::Null)
}

/// Nullable typed read; NULL and decode failures are both `None`.
fn get<'r, R, T>(row: &'r R, index: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Text fallback for types without a dedicated arm (enums, domains, ...).
fn text<'r, R>(row: &'r R, index: usize) -> Option<JsonValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<String>, _>(index)
        .or_else(|_| row.try_get_unchecked::<Option<String>, _>(index))
        .ok()
        .flatten()
        .map(JsonValue::String)
}

fn float(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn decimal(v: Decimal) -> JsonValue {
    match v.to_f64() {
        Some(f) => float(f),
        None => JsonValue::String(v.to_string()),
    }
}
