//! Row → graph record conversion.
//!
//! [`RecordBuilder::build`] is a pure function of the row and the static
//! [`RecordLayout`]: it reads endpoint keys, the optional rank and the
//! configured properties, and never touches the network.
//!
//! Endpoint keys follow the identifier policy of the endpoint:
//!
//! - **no policy**: the field must be declared integral; its value is rendered
//!   in decimal. Any other declared type is a fatal schema error.
//! - **policy set**: the value is taken verbatim as a string. Resolution to the
//!   store's internal key happens in the write layer.
//! - **spatial**: the key is the composite of ancestor cell ids of the
//!   latitude/longitude pair (see [`crate::spatial`]).

use std::sync::Arc;

use graphload_tabular::RowRef;

use crate::config::{EdgeConfig, EndpointConfig, SpatialConfig, TagConfig};
use crate::error::{LoadError, Result};
use crate::record::{GraphRecord, PropertyValue, RecordKind};
use crate::spatial::{composite_key, CellIndexer, S2CellIndexer};

/// Static description of how rows of one entity type become records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub kind: RecordKind,
    /// Edge type or tag name in the store.
    pub name: String,
    pub source: EndpointConfig,
    /// Present for edges only.
    pub target: Option<EndpointConfig>,
    pub rank_field: Option<String>,
    /// `(source field, property name)` pairs, blank entries removed.
    properties: Vec<(String, String)>,
}

impl RecordLayout {
    pub fn for_edge(config: &EdgeConfig) -> Self {
        Self {
            kind: RecordKind::Edge,
            name: config.name.clone(),
            source: config.source.clone(),
            target: Some(config.target.clone()),
            rank_field: config
                .rank_field
                .clone()
                .filter(|f| !f.trim().is_empty()),
            properties: pair_properties(&config.fields, &config.property_names),
        }
    }

    pub fn for_tag(config: &TagConfig) -> Self {
        Self {
            kind: RecordKind::Vertex,
            name: config.name.clone(),
            source: config.vertex.clone(),
            target: None,
            rank_field: None,
            properties: pair_properties(&config.fields, &config.property_names),
        }
    }

    /// Property names in record value order.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.iter().map(|(_, name)| name.clone()).collect()
    }

    /// Source fields in record value order.
    pub fn property_fields(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(field, _)| field.as_str())
    }
}

fn pair_properties(fields: &[String], names: &[String]) -> Vec<(String, String)> {
    let names = if names.is_empty() { fields } else { names };
    fields
        .iter()
        .zip(names)
        .filter(|(field, name)| !field.trim().is_empty() && !name.trim().is_empty())
        .map(|(field, name)| (field.clone(), name.clone()))
        .collect()
}

/// Converts rows into [`GraphRecord`]s for one [`RecordLayout`].
#[derive(Clone)]
pub struct RecordBuilder {
    layout: Arc<RecordLayout>,
    indexer: Arc<dyn CellIndexer>,
}

impl std::fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("layout", &self.layout)
            .finish()
    }
}

impl RecordBuilder {
    pub fn new(layout: Arc<RecordLayout>) -> Self {
        Self::with_indexer(layout, Arc::new(S2CellIndexer))
    }

    pub fn with_indexer(layout: Arc<RecordLayout>, indexer: Arc<dyn CellIndexer>) -> Self {
        Self { layout, indexer }
    }

    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Build one record from one row.
    pub fn build(&self, row: &RowRef<'_>) -> Result<GraphRecord> {
        let layout = &*self.layout;
        let source = self.endpoint_key(row, &layout.source)?;
        let target = layout
            .target
            .as_ref()
            .map(|t| self.endpoint_key(row, t))
            .transpose()?;
        let rank = layout
            .rank_field
            .as_deref()
            .map(|field| extract_rank(row, field))
            .transpose()?
            .flatten();

        let mut values = Vec::with_capacity(layout.properties.len());
        for field in layout.property_fields() {
            let value = row
                .get(field)
                .ok_or_else(|| LoadError::FieldNotFound(field.to_string()))?;
            values.push(PropertyValue::from(value));
        }

        Ok(GraphRecord {
            source,
            target,
            rank,
            values,
        })
    }

    fn endpoint_key(&self, row: &RowRef<'_>, endpoint: &EndpointConfig) -> Result<String> {
        if let Some(spatial) = &endpoint.spatial {
            return self.spatial_key(row, spatial);
        }
        match endpoint.policy {
            None => extract_integral_key(row, &endpoint.field),
            Some(_) => extract_verbatim_key(row, &endpoint.field),
        }
    }

    fn spatial_key(&self, row: &RowRef<'_>, spatial: &SpatialConfig) -> Result<String> {
        let lat = extract_coordinate(row, &spatial.latitude)?;
        let lng = extract_coordinate(row, &spatial.longitude)?;
        composite_key(self.indexer.as_ref(), lat, lng, spatial)
    }
}

fn declared_type(row: &RowRef<'_>, field: &str) -> Result<graphload_tabular::FieldType> {
    row.field_type(field)
        .ok_or_else(|| LoadError::FieldNotFound(field.to_string()))
}

fn extract_integral_key(row: &RowRef<'_>, field: &str) -> Result<String> {
    let field_type = declared_type(row, field)?;
    if !field_type.is_integral() {
        return Err(LoadError::UnsupportedFieldType {
            field: field.to_string(),
            field_type,
        });
    }
    row.get(field)
        .flatten()
        .and_then(|v| v.as_i64())
        .map(|v| v.to_string())
        .ok_or_else(|| LoadError::NullKey {
            field: field.to_string(),
        })
}

fn extract_verbatim_key(row: &RowRef<'_>, field: &str) -> Result<String> {
    declared_type(row, field)?;
    row.get(field)
        .flatten()
        .map(|v| v.to_string())
        .ok_or_else(|| LoadError::NullKey {
            field: field.to_string(),
        })
}

fn extract_rank(row: &RowRef<'_>, field: &str) -> Result<Option<i64>> {
    let field_type = declared_type(row, field)?;
    if !field_type.is_integral() {
        return Err(LoadError::UnsupportedFieldType {
            field: field.to_string(),
            field_type,
        });
    }
    Ok(row.get(field).flatten().and_then(|v| v.as_i64()))
}

fn extract_coordinate(row: &RowRef<'_>, field: &str) -> Result<f64> {
    let field_type = declared_type(row, field)?;
    if !(field_type.is_floating() || field_type.is_integral()) {
        return Err(LoadError::UnsupportedFieldType {
            field: field.to_string(),
            field_type,
        });
    }
    row.get(field)
        .flatten()
        .and_then(|v| v.as_f64())
        .ok_or_else(|| LoadError::NullKey {
            field: field.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyPolicy;
    use graphload_tabular::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};

    fn batch(fields: Vec<FieldInfo>, columns: Vec<Column>) -> ColumnBatch {
        ColumnBatch::new(Arc::new(BatchSchema::new(fields)), columns).unwrap()
    }

    fn edge_layout(source: EndpointConfig, target: EndpointConfig) -> RecordLayout {
        RecordLayout::for_edge(&EdgeConfig::new("follow", source, target))
    }

    #[test]
    fn test_integral_endpoints_without_rank() {
        let rows = batch(
            vec![
                FieldInfo::new("src", FieldType::Int32),
                FieldInfo::new("dst", FieldType::Int64),
            ],
            vec![Column::Int32(vec![Some(42)]), Column::Int64(vec![Some(7)])],
        );
        let builder = RecordBuilder::new(Arc::new(edge_layout(
            EndpointConfig::field("src"),
            EndpointConfig::field("dst"),
        )));

        let record = builder.build(&rows.row(0).unwrap()).unwrap();
        assert_eq!(record.source, "42");
        assert_eq!(record.target.as_deref(), Some("7"));
        assert_eq!(record.rank, None);
        assert!(record.values.is_empty());

        // Same row, same layout: same record.
        assert_eq!(builder.build(&rows.row(0).unwrap()).unwrap(), record);
    }

    #[test]
    fn test_non_integral_endpoint_without_policy_is_fatal() {
        let rows = batch(
            vec![
                FieldInfo::new("src", FieldType::String),
                FieldInfo::new("dst", FieldType::Int64),
            ],
            vec![
                Column::String(vec![Some("a".into())]),
                Column::Int64(vec![Some(7)]),
            ],
        );
        let builder = RecordBuilder::new(Arc::new(edge_layout(
            EndpointConfig::field("src"),
            EndpointConfig::field("dst"),
        )));
        let err = builder.build(&rows.row(0).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedFieldType { ref field, field_type: FieldType::String } if field == "src"
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_policy_takes_value_verbatim() {
        let rows = batch(
            vec![
                FieldInfo::new("src", FieldType::String),
                FieldInfo::new("dst", FieldType::Float64),
            ],
            vec![
                Column::String(vec![Some("alice".into())]),
                Column::Float64(vec![Some(1.5)]),
            ],
        );
        let builder = RecordBuilder::new(Arc::new(edge_layout(
            EndpointConfig::field("src").with_policy(KeyPolicy::Hash),
            EndpointConfig::field("dst").with_policy(KeyPolicy::Uuid),
        )));
        let record = builder.build(&rows.row(0).unwrap()).unwrap();
        assert_eq!(record.source, "alice");
        assert_eq!(record.target.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_rank_widening_and_rejection() {
        let rows = batch(
            vec![
                FieldInfo::new("src", FieldType::Int64),
                FieldInfo::new("dst", FieldType::Int64),
                FieldInfo::new("r16", FieldType::Int16),
                FieldInfo::new("rf", FieldType::Float32),
            ],
            vec![
                Column::Int64(vec![Some(1), Some(2)]),
                Column::Int64(vec![Some(3), Some(4)]),
                Column::Int16(vec![Some(-5), None]),
                Column::Float32(vec![Some(0.5), Some(0.5)]),
            ],
        );
        let mut config = EdgeConfig::new(
            "e",
            EndpointConfig::field("src"),
            EndpointConfig::field("dst"),
        );
        config.rank_field = Some("r16".into());
        let builder = RecordBuilder::new(Arc::new(RecordLayout::for_edge(&config)));
        assert_eq!(builder.build(&rows.row(0).unwrap()).unwrap().rank, Some(-5));
        assert_eq!(builder.build(&rows.row(1).unwrap()).unwrap().rank, None);

        config.rank_field = Some("rf".into());
        let builder = RecordBuilder::new(Arc::new(RecordLayout::for_edge(&config)));
        assert!(matches!(
            builder.build(&rows.row(0).unwrap()),
            Err(LoadError::UnsupportedFieldType { field_type: FieldType::Float32, .. })
        ));
    }

    #[test]
    fn test_properties_skip_blank_names() {
        let rows = batch(
            vec![
                FieldInfo::new("id", FieldType::Int64),
                FieldInfo::new("name", FieldType::String),
                FieldInfo::new("age", FieldType::Int8),
                FieldInfo::new("born", FieldType::Date),
            ],
            vec![
                Column::Int64(vec![Some(1)]),
                Column::String(vec![None]),
                Column::Int8(vec![Some(30)]),
                Column::Date(vec![Some(19000)]),
            ],
        );
        let mut tag = TagConfig::new("player", EndpointConfig::field("id"));
        tag.fields = vec!["name".into(), "".into(), "age".into(), "born".into()];
        tag.property_names = vec!["name".into(), "ignored".into(), "age".into(), " ".into()];
        let layout = RecordLayout::for_tag(&tag);
        assert_eq!(layout.property_names(), vec!["name", "age"]);

        let record = RecordBuilder::new(Arc::new(layout))
            .build(&rows.row(0).unwrap())
            .unwrap();
        assert_eq!(record.target, None);
        assert_eq!(
            record.values,
            vec![PropertyValue::Null, PropertyValue::Int(30)]
        );
    }

    #[test]
    fn test_missing_and_null_fields() {
        let rows = batch(
            vec![FieldInfo::new("id", FieldType::Int64)],
            vec![Column::Int64(vec![None])],
        );
        let builder = RecordBuilder::new(Arc::new(RecordLayout::for_tag(&TagConfig::new(
            "t",
            EndpointConfig::field("id"),
        ))));
        let err = builder.build(&rows.row(0).unwrap()).unwrap_err();
        assert!(err.is_skippable());

        let builder = RecordBuilder::new(Arc::new(RecordLayout::for_tag(&TagConfig::new(
            "t",
            EndpointConfig::field("nope"),
        ))));
        assert!(matches!(
            builder.build(&rows.row(0).unwrap()),
            Err(LoadError::FieldNotFound(f)) if f == "nope"
        ));
    }

    #[test]
    fn test_spatial_source_key() {
        let rows = batch(
            vec![
                FieldInfo::new("lat", FieldType::Float64),
                FieldInfo::new("lng", FieldType::Float64),
                FieldInfo::new("poi", FieldType::Int64),
            ],
            vec![
                Column::Float64(vec![Some(37.7749)]),
                Column::Float64(vec![Some(-122.4194)]),
                Column::Int64(vec![Some(9)]),
            ],
        );
        let builder = RecordBuilder::new(Arc::new(edge_layout(
            EndpointConfig::spatial(SpatialConfig::new("lat", "lng").with_levels(10, 18)),
            EndpointConfig::field("poi"),
        )));
        let record = builder.build(&rows.row(0).unwrap()).unwrap();
        assert_eq!(record.source.split(',').count(), 9);
        assert_eq!(record.target.as_deref(), Some("9"));
    }
}
