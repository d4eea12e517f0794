//! Result sanitisation (spec §4.4, §9). The BigQuery REST surface
//! returns every exotic column type as a plain JSON string — epoch
//! timestamps, NUMERIC/BIGNUMERIC decimal strings, base64 BYTES — so a
//! single value-level sanitiser normalises them into primitives that
//! serialise safely downstream. Applied at the executor boundary
//! (primary) and again at the warehouse client boundary (defence in
//! depth); both call this same module, never a copy of it.
//!
//! Epoch-timestamp conversion is gated on the column's *declared*
//! BigQuery type, never guessed from a string's shape: a bare integer
//! column (`SELECT 1 AS x`) and a `TIMESTAMP` column both come back
//! over the REST API as a digit-leading string, and only the schema
//! tells them apart.

use chrono::{TimeZone, Utc};
use nl2sql_core::{Nl2SqlResult, SanitisationError};
use serde_json::{Number, Value};
use std::collections::HashMap;

use crate::Row;

const NULL_SENTINELS: [&str; 3] = ["NULL", "null", "\\N"];

/// A result column's name and its warehouse-declared type (e.g.
/// `"TIMESTAMP"`, `"INTEGER"`), as reported by the query response
/// schema. `bq_type` is `None` when the warehouse didn't report one
/// (defensive only; a real response always carries a schema).
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub bq_type: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, bq_type: Option<String>) -> Self {
        Self { name: name.into(), bq_type }
    }
}

/// Sanitise a full row of raw warehouse cells into JSON-safe values,
/// using each column's declared type to decide how to interpret it.
pub fn sanitize_row(fields: &[FieldSchema], raw_values: &[Value]) -> Row {
    let mut row: Row = HashMap::with_capacity(fields.len());
    for (field, raw) in fields.iter().zip(raw_values.iter()) {
        row.insert(field.name.clone(), sanitize_value(&field.name, raw, field.bq_type.as_deref()));
    }
    row
}

/// Sanitise one cell, given its column's declared BigQuery type (if
/// known). Never fails: a field that cannot be sanitised degrades to
/// its raw string representation (spec §4.4 "Sanitisation errors on
/// individual fields degrade to best-effort string representation
/// rather than failing the whole row").
pub fn sanitize_value(field: &str, raw: &Value, bq_type: Option<&str>) -> Value {
    match try_sanitize(field, raw, bq_type) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(field, error = %err, "falling back to string representation");
            Value::String(raw.to_string())
        }
    }
}

fn try_sanitize(field: &str, raw: &Value, bq_type: Option<&str>) -> Nl2SqlResult<Value> {
    match raw {
        Value::Null => Ok(Value::Null),
        Value::String(s) => sanitize_string(field, s, bq_type),
        Value::Number(_) | Value::Bool(_) => Ok(raw.clone()),
        Value::Array(items) => {
            let sanitized: Vec<Value> = items.iter().map(|item| sanitize_value(field, item, bq_type)).collect();
            Ok(Value::Array(sanitized))
        }
        Value::Object(map) => {
            // Nested RECORD/STRUCT fields have no per-field type info
            // threaded from the top-level schema, so they're never
            // eligible for epoch-timestamp conversion.
            let sanitized: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sanitize_value(&format!("{field}.{k}"), v, None)))
                .collect();
            Ok(Value::Object(sanitized))
        }
    }
}

fn is_timestamp_type(bq_type: Option<&str>) -> bool {
    bq_type.map(|t| t.eq_ignore_ascii_case("TIMESTAMP")).unwrap_or(false)
}

fn sanitize_string(field: &str, s: &str, bq_type: Option<&str>) -> Nl2SqlResult<Value> {
    if NULL_SENTINELS.contains(&s) {
        return Ok(Value::Null);
    }

    if is_timestamp_type(bq_type) {
        if let Some(timestamp) = try_parse_epoch_timestamp(s) {
            return Ok(Value::String(timestamp));
        }
    }

    if let Some(number) = try_parse_large_numeric(s) {
        return Ok(number);
    }

    if s.is_empty() {
        return Err(SanitisationError::Unrepresentable {
            field: field.to_string(),
            reason: "empty string with no recognised sentinel meaning".to_string(),
        }
        .into());
    }

    Ok(Value::String(s.to_string()))
}

/// BigQuery's REST API represents TIMESTAMP as Unix epoch seconds,
/// optionally with a fractional microsecond component
/// (e.g. `"1700000000.123456"`). Only called for columns the schema
/// actually declares as TIMESTAMP.
fn try_parse_epoch_timestamp(s: &str) -> Option<String> {
    if !s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        return None;
    }
    let seconds: f64 = s.parse().ok()?;
    if !(0.0..=4_102_444_800.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds.fract()) * 1_000_000_000.0).round() as u32;
    let dt = Utc.timestamp_opt(whole, nanos).single()?;
    Some(dt.to_rfc3339())
}

/// NUMERIC/BIGNUMERIC decimal strings that fit in an `f64` without
/// precision loss become JSON numbers; values outside safe integer
/// range are left as strings to avoid silently truncating precision.
fn try_parse_large_numeric(s: &str) -> Option<Value> {
    if !s.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.' || c == 'e' || c == 'E' || c == '+') {
        return None;
    }
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: f64 = s.parse().ok()?;
    if value.abs() > 9_007_199_254_740_991.0 {
        return None;
    }
    Number::from_f64(value).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinels_become_json_null() {
        assert_eq!(sanitize_value("x", &Value::String("NULL".to_string()), None), Value::Null);
        assert_eq!(sanitize_value("x", &Value::String("\\N".to_string()), None), Value::Null);
    }

    #[test]
    fn epoch_timestamp_string_becomes_rfc3339_when_column_is_declared_timestamp() {
        let sanitized = sanitize_value("traded_at", &Value::String("1700000000".to_string()), Some("TIMESTAMP"));
        match sanitized {
            Value::String(s) => assert!(s.starts_with("2023-11-14")),
            other => panic!("expected timestamp string, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_type_match_is_case_insensitive() {
        let sanitized = sanitize_value("traded_at", &Value::String("1700000000".to_string()), Some("timestamp"));
        match sanitized {
            Value::String(s) => assert!(s.starts_with("2023-11-14")),
            other => panic!("expected timestamp string, got {other:?}"),
        }
    }

    #[test]
    fn plausible_epoch_value_without_declared_timestamp_type_stays_numeric() {
        // Seed scenario 1: `SELECT 1 AS x` must sanitise to `{"x": 1}`,
        // not `{"x": "1970-01-01T00:00:01+00:00"}` — an undeclared or
        // non-TIMESTAMP column is never treated as an epoch timestamp
        // just because its value happens to land in plausible range.
        let sanitized = sanitize_value("x", &Value::String("1".to_string()), None);
        assert_eq!(sanitized, Value::Number(Number::from_f64(1.0).unwrap()));
    }

    #[test]
    fn integer_column_with_plausible_epoch_value_stays_numeric() {
        let sanitized = sanitize_value("trade_count", &Value::String("1700000000".to_string()), Some("INTEGER"));
        assert_eq!(sanitized, Value::Number(Number::from_f64(1_700_000_000.0).unwrap()));
    }

    #[test]
    fn plain_text_passes_through_unchanged() {
        let sanitized = sanitize_value("symbol", &Value::String("SPX".to_string()), None);
        assert_eq!(sanitized, Value::String("SPX".to_string()));
    }

    #[test]
    fn numeric_decimal_string_becomes_number() {
        let sanitized = sanitize_value("notional", &Value::String("1234.5".to_string()), Some("NUMERIC"));
        assert_eq!(sanitized, Value::Number(Number::from_f64(1234.5).unwrap()));
    }

    #[test]
    fn oversized_decimal_string_stays_a_string_to_avoid_precision_loss() {
        let huge = "123456789012345678901234.123456789";
        let sanitized = sanitize_value("bignumeric_col", &Value::String(huge.to_string()), Some("BIGNUMERIC"));
        assert_eq!(sanitized, Value::String(huge.to_string()));
    }

    #[test]
    fn sanitize_row_zips_fields_and_values_using_each_fields_declared_type() {
        let fields = vec![
            FieldSchema::new("a", None),
            FieldSchema::new("traded_at", Some("TIMESTAMP".to_string())),
        ];
        let values = vec![Value::String("NULL".to_string()), Value::String("1700000000".to_string())];
        let row = sanitize_row(&fields, &values);
        assert_eq!(row.get("a"), Some(&Value::Null));
        match row.get("traded_at") {
            Some(Value::String(s)) => assert!(s.starts_with("2023-11-14")),
            other => panic!("expected timestamp string, got {other:?}"),
        }
    }
}
