//! Columnar batch format for source rows.
//!
//! A [`ColumnBatch`] is a slice of one partition's input: typed column vectors
//! plus the schema that names them. Readers produce batches; the ingestion
//! core walks them row by row through [`RowRef`](crate::RowRef).

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabularError};
use crate::row::RowRef;

/// Declared semantic type of a source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    /// Days since 1970-01-01
    Date,
    /// Microseconds since epoch (UTC)
    Timestamp,
}

impl FieldType {
    /// True for the fixed-width integer types.
    ///
    /// Only integral fields can be used as bare entity keys or edge ranks.
    #[inline]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }

    /// True for floating point types.
    #[inline]
    pub fn is_floating(self) -> bool {
        matches!(self, FieldType::Float32 | FieldType::Float64)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Field information for a column in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Column name, the canonical lookup key.
    pub name: String,
    /// Declared field type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field allows nulls.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Schema for a column batch.
#[derive(Debug, Clone)]
pub struct BatchSchema {
    /// Field definitions in column order.
    pub fields: Vec<FieldInfo>,
    name_to_index: HashMap<String, usize>,
}

impl BatchSchema {
    /// Create a new batch schema from field definitions.
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        let name_to_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Self {
            fields,
            name_to_index,
        }
    }

    /// Get field index by name.
    #[inline]
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get field info by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.index_by_name(name).map(|i| &self.fields[i])
    }

    /// Number of fields in the schema.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

/// Column storage - typed arrays with optional values (nullable).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int8(Vec<Option<i8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Bytes(Vec<Option<Vec<u8>>>),
    Date(Vec<Option<i32>>),
    Timestamp(Vec<Option<i64>>),
}

impl Column {
    /// Create an empty column of the given type with pre-allocated capacity.
    pub fn with_capacity(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Boolean => Self::Boolean(Vec::with_capacity(capacity)),
            FieldType::Int8 => Self::Int8(Vec::with_capacity(capacity)),
            FieldType::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            FieldType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            FieldType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            FieldType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            FieldType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            FieldType::String => Self::String(Vec::with_capacity(capacity)),
            FieldType::Bytes => Self::Bytes(Vec::with_capacity(capacity)),
            FieldType::Date => Self::Date(Vec::with_capacity(capacity)),
            FieldType::Timestamp => Self::Timestamp(Vec::with_capacity(capacity)),
        }
    }

    /// Get the number of rows in this column.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) | Self::Date(v) => v.len(),
            Self::Int64(v) | Self::Timestamp(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the field type of this column.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Boolean(_) => FieldType::Boolean,
            Self::Int8(_) => FieldType::Int8,
            Self::Int16(_) => FieldType::Int16,
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
            Self::Date(_) => FieldType::Date,
            Self::Timestamp(_) => FieldType::Timestamp,
        }
    }

    /// Check if value at index is null (out-of-range reads as null).
    #[inline]
    pub fn is_null(&self, idx: usize) -> bool {
        self.value(idx).is_none()
    }

    /// Borrow the value at `idx`, or `None` when null or out of range.
    pub fn value(&self, idx: usize) -> Option<crate::ScalarRef<'_>> {
        use crate::ScalarRef;
        match self {
            Self::Boolean(v) => v.get(idx).copied().flatten().map(ScalarRef::Boolean),
            Self::Int8(v) => v.get(idx).copied().flatten().map(ScalarRef::Int8),
            Self::Int16(v) => v.get(idx).copied().flatten().map(ScalarRef::Int16),
            Self::Int32(v) => v.get(idx).copied().flatten().map(ScalarRef::Int32),
            Self::Int64(v) => v.get(idx).copied().flatten().map(ScalarRef::Int64),
            Self::Float32(v) => v.get(idx).copied().flatten().map(ScalarRef::Float32),
            Self::Float64(v) => v.get(idx).copied().flatten().map(ScalarRef::Float64),
            Self::String(v) => v
                .get(idx)
                .and_then(|v| v.as_deref())
                .map(ScalarRef::String),
            Self::Bytes(v) => v
                .get(idx)
                .and_then(|v| v.as_deref())
                .map(ScalarRef::Bytes),
            Self::Date(v) => v.get(idx).copied().flatten().map(ScalarRef::Date),
            Self::Timestamp(v) => v.get(idx).copied().flatten().map(ScalarRef::Timestamp),
        }
    }

    /// Copy out a contiguous range of rows.
    pub fn slice(&self, range: Range<usize>) -> Self {
        match self {
            Self::Boolean(v) => Self::Boolean(v[range].to_vec()),
            Self::Int8(v) => Self::Int8(v[range].to_vec()),
            Self::Int16(v) => Self::Int16(v[range].to_vec()),
            Self::Int32(v) => Self::Int32(v[range].to_vec()),
            Self::Int64(v) => Self::Int64(v[range].to_vec()),
            Self::Float32(v) => Self::Float32(v[range].to_vec()),
            Self::Float64(v) => Self::Float64(v[range].to_vec()),
            Self::String(v) => Self::String(v[range].to_vec()),
            Self::Bytes(v) => Self::Bytes(v[range].to_vec()),
            Self::Date(v) => Self::Date(v[range].to_vec()),
            Self::Timestamp(v) => Self::Timestamp(v[range].to_vec()),
        }
    }
}

/// Columnar batch of source rows.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    /// Schema for this batch.
    pub schema: Arc<BatchSchema>,
    /// Column data in schema order.
    pub columns: Vec<Column>,
    /// Number of rows in the batch.
    pub num_rows: usize,
}

impl ColumnBatch {
    /// Create a new column batch, checking columns against the schema.
    pub fn new(schema: Arc<BatchSchema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(TabularError::Schema(format!(
                "Column count mismatch: schema has {} fields, got {} columns",
                schema.num_fields(),
                columns.len()
            )));
        }

        let num_rows = columns.first().map_or(0, |c| c.len());

        for (field, col) in schema.fields.iter().zip(&columns) {
            if col.field_type() != field.field_type {
                return Err(TabularError::Schema(format!(
                    "Type mismatch: field {} is declared {}, column holds {}",
                    field.name,
                    field.field_type,
                    col.field_type()
                )));
            }
            if col.len() != num_rows {
                return Err(TabularError::Schema(format!(
                    "Row count mismatch: column {} has {} rows, expected {}",
                    field.name,
                    col.len(),
                    num_rows
                )));
            }
        }

        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// Create an empty batch with the given schema.
    pub fn empty(schema: Arc<BatchSchema>) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|f| Column::with_capacity(f.field_type, 0))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Get column by name.
    #[inline]
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.schema.index_by_name(name).map(|i| &self.columns[i])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Borrow one row.
    pub fn row(&self, idx: usize) -> Option<RowRef<'_>> {
        (idx < self.num_rows).then(|| RowRef::new(self, idx))
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.num_rows).map(move |idx| RowRef::new(self, idx))
    }

    /// Copy a contiguous range of rows into a new batch sharing the schema.
    ///
    /// The range is clamped to the batch length.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.num_rows);
        let start = range.start.min(end);
        Self {
            schema: Arc::clone(&self.schema),
            columns: self.columns.iter().map(|c| c.slice(start..end)).collect(),
            num_rows: end - start,
        }
    }

    /// Split into `parts` contiguous, non-overlapping batches.
    ///
    /// Earlier parts absorb the remainder, so part sizes differ by at most one.
    pub fn split(&self, parts: usize) -> Vec<ColumnBatch> {
        let parts = parts.max(1);
        let base = self.num_rows / parts;
        let extra = self.num_rows % parts;
        let mut out = Vec::with_capacity(parts);
        let mut start = 0;
        for i in 0..parts {
            let len = base + usize::from(i < extra);
            out.push(self.slice(start..start + len));
            start += len;
        }
        out
    }
}
