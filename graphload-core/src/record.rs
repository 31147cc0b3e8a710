//! Graph records built from source rows.

use graphload_tabular::ScalarRef;

/// Whether a record becomes an edge or a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Edge,
    Vertex,
}

impl RecordKind {
    /// Keyword used in write statements.
    pub fn keyword(self) -> &'static str {
        match self {
            RecordKind::Edge => "EDGE",
            RecordKind::Vertex => "VERTEX",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Edge => f.write_str("edge"),
            RecordKind::Vertex => f.write_str("vertex"),
        }
    }
}

/// A property value coerced from its declared source type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Days since 1970-01-01
    Date(i32),
    /// Microseconds since epoch (UTC)
    Timestamp(i64),
}

impl From<Option<ScalarRef<'_>>> for PropertyValue {
    fn from(value: Option<ScalarRef<'_>>) -> Self {
        let Some(value) = value else {
            return PropertyValue::Null;
        };
        match value {
            ScalarRef::Boolean(v) => PropertyValue::Bool(v),
            ScalarRef::Int8(_) | ScalarRef::Int16(_) | ScalarRef::Int32(_) | ScalarRef::Int64(_) => {
                // as_i64 is total over the integral variants
                PropertyValue::Int(value.as_i64().unwrap_or_default())
            }
            ScalarRef::Float32(v) => PropertyValue::Float(f64::from(v)),
            ScalarRef::Float64(v) => PropertyValue::Float(v),
            ScalarRef::String(v) => PropertyValue::String(v.to_string()),
            ScalarRef::Bytes(v) => PropertyValue::String(String::from_utf8_lossy(v).into_owned()),
            ScalarRef::Date(v) => PropertyValue::Date(v),
            ScalarRef::Timestamp(v) => PropertyValue::Timestamp(v),
        }
    }
}

/// One edge or vertex ready to be written.
///
/// `values` line up with the property-name list of the batch the record is
/// written in. For vertices `target` is always `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRecord {
    pub source: String,
    pub target: Option<String>,
    pub rank: Option<i64>,
    pub values: Vec<PropertyValue>,
}

impl GraphRecord {
    pub fn edge(
        source: impl Into<String>,
        target: impl Into<String>,
        rank: Option<i64>,
        values: Vec<PropertyValue>,
    ) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
            rank,
            values,
        }
    }

    pub fn vertex(key: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        Self {
            source: key.into(),
            target: None,
            rank: None,
            values,
        }
    }

    pub fn kind(&self) -> RecordKind {
        if self.target.is_some() {
            RecordKind::Edge
        } else {
            RecordKind::Vertex
        }
    }
}
