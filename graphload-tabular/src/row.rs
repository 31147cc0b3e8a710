//! Row view over a [`ColumnBatch`].

use std::fmt;

use crate::batch::{ColumnBatch, FieldInfo, FieldType};

/// A borrowed, non-null scalar taken from one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarRef<'a> {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(&'a str),
    Bytes(&'a [u8]),
    Date(i32),
    Timestamp(i64),
}

impl ScalarRef<'_> {
    /// Widen an integral scalar to `i64`; `None` for every other type.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ScalarRef::Int8(v) => Some(i64::from(v)),
            ScalarRef::Int16(v) => Some(i64::from(v)),
            ScalarRef::Int32(v) => Some(i64::from(v)),
            ScalarRef::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Read a floating point or integral scalar as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ScalarRef::Float32(v) => Some(f64::from(v)),
            ScalarRef::Float64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }
}

/// Renders the cell the way it appears in the source, without quoting.
impl fmt::Display for ScalarRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarRef::Boolean(v) => write!(f, "{v}"),
            ScalarRef::Int8(v) => write!(f, "{v}"),
            ScalarRef::Int16(v) => write!(f, "{v}"),
            ScalarRef::Int32(v) | ScalarRef::Date(v) => write!(f, "{v}"),
            ScalarRef::Int64(v) | ScalarRef::Timestamp(v) => write!(f, "{v}"),
            ScalarRef::Float32(v) => write!(f, "{v}"),
            ScalarRef::Float64(v) => write!(f, "{v}"),
            ScalarRef::String(v) => f.write_str(v),
            ScalarRef::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

/// One row of a [`ColumnBatch`].
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    batch: &'a ColumnBatch,
    idx: usize,
}

impl<'a> RowRef<'a> {
    pub(crate) fn new(batch: &'a ColumnBatch, idx: usize) -> Self {
        Self { batch, idx }
    }

    /// Position of this row inside its batch.
    #[inline]
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Declared field metadata, or `None` when the schema has no such field.
    pub fn field(&self, name: &str) -> Option<&'a FieldInfo> {
        self.batch.schema.field_by_name(name)
    }

    /// Declared type of a field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.field(name).map(|f| f.field_type)
    }

    /// Value of a field: `None` when the field is absent, `Some(None)` when null.
    pub fn get(&self, name: &str) -> Option<Option<ScalarRef<'a>>> {
        self.batch
            .column_by_name(name)
            .map(|column| column.value(self.idx))
    }
}

impl fmt::Debug for RowRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, column) in self.batch.schema.fields.iter().zip(&self.batch.columns) {
            map.entry(&field.name, &column.value(self.idx));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchSchema, Column};
    use std::sync::Arc;

    #[test]
    fn test_row_lookup_by_name() {
        let schema = Arc::new(BatchSchema::new(vec![
            FieldInfo::new("src", FieldType::Int16),
            FieldInfo::new("label", FieldType::String),
        ]));
        let batch = ColumnBatch::new(
            schema,
            vec![
                Column::Int16(vec![Some(7), None]),
                Column::String(vec![Some("a".into()), Some("b".into())]),
            ],
        )
        .unwrap();

        let row = batch.row(0).unwrap();
        assert_eq!(row.field_type("src"), Some(FieldType::Int16));
        assert_eq!(row.get("src"), Some(Some(ScalarRef::Int16(7))));
        assert_eq!(row.get("src").flatten().and_then(|v| v.as_i64()), Some(7));
        assert_eq!(row.get("missing"), None);

        let row = batch.row(1).unwrap();
        assert_eq!(row.get("src"), Some(None));
        assert_eq!(row.get("label"), Some(Some(ScalarRef::String("b"))));
        assert!(batch.row(2).is_none());
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(ScalarRef::Int64(-42).to_string(), "-42");
        assert_eq!(ScalarRef::String("x y").to_string(), "x y");
        assert_eq!(ScalarRef::Boolean(true).to_string(), "true");
    }
}
