//! JSON-lines input.
//!
//! Every non-blank line is one JSON object. Values are coerced to the field
//! types declared in the config's `[input]` section; keys not in the schema
//! are ignored and missing keys read as null.

use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use graphload_tabular::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
use serde_json::{Map, Value};

use crate::error::{CliError, CliResult};

/// Read a whole JSON-lines file (`-` for stdin) into one batch.
pub fn read_json_lines_path(path: &Path, schema: Arc<BatchSchema>) -> CliResult<ColumnBatch> {
    if path.as_os_str() == "-" {
        return read_json_lines(io::stdin().lock(), schema);
    }
    let file = std::fs::File::open(path)
        .map_err(|e| CliError::Input(format!("failed to open {}: {e}", path.display())))?;
    read_json_lines(BufReader::new(file), schema)
}

pub fn read_json_lines<R: BufRead>(reader: R, schema: Arc<BatchSchema>) -> CliResult<ColumnBatch> {
    if schema.num_fields() == 0 {
        return Err(CliError::Config(
            "the [input] section declares no fields".to_string(),
        ));
    }
    let mut rows: Vec<(usize, Map<String, Value>)> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => rows.push((line_no, map)),
            Ok(_) => {
                return Err(CliError::Input(format!(
                    "line {line_no}: expected a JSON object"
                )))
            }
            Err(e) => return Err(CliError::Input(format!("line {line_no}: {e}"))),
        }
    }

    let columns = schema
        .fields
        .iter()
        .map(|field| build_column(field, &rows))
        .collect::<CliResult<Vec<_>>>()?;
    ColumnBatch::new(schema, columns).map_err(|e| CliError::Input(e.to_string()))
}

fn build_column(field: &FieldInfo, rows: &[(usize, Map<String, Value>)]) -> CliResult<Column> {
    macro_rules! collect {
        ($variant:ident, $convert:expr) => {
            Column::$variant(
                rows.iter()
                    .map(|(line, row)| cell(field, *line, row, $convert))
                    .collect::<CliResult<Vec<_>>>()?,
            )
        };
    }
    Ok(match field.field_type {
        FieldType::Boolean => collect!(Boolean, Value::as_bool),
        FieldType::Int8 => collect!(Int8, |v: &Value| narrow(v)),
        FieldType::Int16 => collect!(Int16, |v: &Value| narrow(v)),
        FieldType::Int32 => collect!(Int32, |v: &Value| narrow(v)),
        FieldType::Int64 => collect!(Int64, Value::as_i64),
        FieldType::Float32 => collect!(Float32, |v: &Value| v.as_f64().map(|f| f as f32)),
        FieldType::Float64 => collect!(Float64, Value::as_f64),
        FieldType::String => collect!(String, |v: &Value| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }),
        FieldType::Bytes => collect!(Bytes, |v: &Value| v.as_str().map(|s| s.as_bytes().to_vec())),
        FieldType::Date => collect!(Date, parse_date),
        FieldType::Timestamp => collect!(Timestamp, parse_timestamp),
    })
}

fn cell<T>(
    field: &FieldInfo,
    line: usize,
    row: &Map<String, Value>,
    convert: impl Fn(&Value) -> Option<T>,
) -> CliResult<Option<T>> {
    match row.get(&field.name) {
        None | Some(Value::Null) if field.nullable => Ok(None),
        None | Some(Value::Null) => Err(CliError::Input(format!(
            "line {line}: field '{}' is required",
            field.name
        ))),
        Some(value) => convert(value).map(Some).ok_or_else(|| {
            CliError::Input(format!(
                "line {line}: field '{}' expects {}, got {value}",
                field.name, field.field_type
            ))
        }),
    }
}

fn narrow<T: TryFrom<i64>>(v: &Value) -> Option<T> {
    v.as_i64().and_then(|i| T::try_from(i).ok())
}

/// Days since 1970-01-01 from `YYYY-MM-DD` or an integer day count.
fn parse_date(v: &Value) -> Option<i32> {
    match v {
        Value::String(s) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            i32::try_from((date - epoch).num_days()).ok()
        }
        other => narrow(other),
    }
}

/// Microseconds since epoch from RFC 3339 or an integer microsecond count.
fn parse_timestamp(v: &Value) -> Option<i64> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_micros()),
        other => other.as_i64(),
    }
}
