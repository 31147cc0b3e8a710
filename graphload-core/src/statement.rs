//! Replayable write statements.
//!
//! Failed batches are persisted as the exact statement that would have
//! written them, so an error log can be replayed later without the source.
//!
//! ```text
//! INSERT EDGE `follow`(`degree`) VALUES 1->2@7: (0.5), 3->4: (NULL)
//! INSERT VERTEX `player`(`name`) VALUES hash("alice"): ("Alice")
//! ```
//!
//! A spatial endpoint holds a composite key; it fans out into one value
//! tuple per cell id on that endpoint.

use chrono::NaiveDate;

use crate::batch::RecordBatch;
use crate::config::{EndpointConfig, VidType};
use crate::record::{GraphRecord, PropertyValue, RecordKind};
use crate::spatial::split_composite_key;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Render a whole batch as one statement, written under `name`.
pub fn render_batch(name: &str, batch: &RecordBatch, vid_type: VidType) -> String {
    let mut out = String::with_capacity(64 + batch.len() * 32);
    out.push_str("INSERT ");
    out.push_str(batch.kind().keyword());
    out.push(' ');
    push_identifier(&mut out, name);
    out.push('(');
    for (i, prop) in batch.property_names.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_identifier(&mut out, prop);
    }
    out.push_str(") VALUES ");

    let layout = &*batch.layout;
    let mut first = true;
    for record in &batch.records {
        let values = render_values(record);
        let sources = endpoint_keys(&record.source, &layout.source, vid_type);
        match (layout.kind, &record.target, &layout.target) {
            (RecordKind::Edge, Some(target), Some(target_cfg)) => {
                let targets = endpoint_keys(target, target_cfg, vid_type);
                for src in &sources {
                    for dst in &targets {
                        push_separator(&mut out, &mut first);
                        out.push_str(src);
                        out.push_str("->");
                        out.push_str(dst);
                        if let Some(rank) = record.rank {
                            out.push('@');
                            out.push_str(&rank.to_string());
                        }
                        out.push_str(": ");
                        out.push_str(&values);
                    }
                }
            }
            _ => {
                for vid in &sources {
                    push_separator(&mut out, &mut first);
                    out.push_str(vid);
                    out.push_str(": ");
                    out.push_str(&values);
                }
            }
        }
    }
    out
}

fn push_separator(out: &mut String, first: &mut bool) {
    if !*first {
        out.push_str(", ");
    }
    *first = false;
}

fn push_identifier(out: &mut String, ident: &str) {
    out.push('`');
    out.push_str(&ident.replace('`', "\\`"));
    out.push('`');
}

fn render_values(record: &GraphRecord) -> String {
    let mut out = String::from("(");
    for (i, value) in record.values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&render_value(value));
    }
    out.push(')');
    out
}

/// Keys an endpoint expands to; more than one only for spatial endpoints.
fn endpoint_keys(key: &str, endpoint: &EndpointConfig, vid_type: VidType) -> Vec<String> {
    if endpoint.spatial.is_some() {
        split_composite_key(key)
            .map(|cell| render_key(cell, endpoint, vid_type))
            .collect()
    } else {
        vec![render_key(key, endpoint, vid_type)]
    }
}

/// Render one entity key.
///
/// A key policy wraps the quoted value in the store-side mapping function.
/// Without one, the key is bare for integer key spaces and quoted otherwise.
pub fn render_key(key: &str, endpoint: &EndpointConfig, vid_type: VidType) -> String {
    match (endpoint.policy, vid_type) {
        (Some(policy), _) => format!("{}({})", policy.function_name(), quote(key)),
        (None, VidType::Int) => key.to_string(),
        (None, VidType::String) => quote(key),
    }
}

/// Render one property literal.
pub fn render_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Null => "NULL".to_string(),
        PropertyValue::Bool(v) => v.to_string(),
        PropertyValue::Int(v) => v.to_string(),
        PropertyValue::Float(v) if v.is_finite() => format!("{v:?}"),
        PropertyValue::Float(_) => "NULL".to_string(),
        PropertyValue::String(v) => quote(v),
        PropertyValue::Date(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| format!("date(\"{}\")", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| "NULL".to_string()),
        PropertyValue::Timestamp(micros) => micros.div_euclid(1_000_000).to_string(),
    }
}

/// Double-quote a string, escaping anything that would break a one-line
/// statement.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batcher;
    use crate::builder::RecordLayout;
    use crate::config::{EdgeConfig, KeyPolicy, SpatialConfig, TagConfig};
    use std::sync::Arc;

    fn single(layout: RecordLayout, record: GraphRecord) -> RecordBatch {
        let mut batcher = Batcher::new(Arc::new(layout), 10);
        assert!(batcher.push(record).is_none());
        batcher.finish().unwrap()
    }

    #[test]
    fn test_edge_statement() {
        let mut config = EdgeConfig::new(
            "follow",
            EndpointConfig::field("src"),
            EndpointConfig::field("dst"),
        );
        config.fields = vec!["degree".into(), "note".into()];
        let mut batcher = Batcher::new(Arc::new(RecordLayout::for_edge(&config)), 10);
        batcher.push(GraphRecord::edge(
            "1",
            "2",
            Some(7),
            vec![PropertyValue::Float(0.5), PropertyValue::String("a\"b".into())],
        ));
        batcher.push(GraphRecord::edge(
            "3",
            "4",
            None,
            vec![PropertyValue::Int(1), PropertyValue::Null],
        ));
        let batch = batcher.finish().unwrap();

        assert_eq!(
            render_batch("follow", &batch, VidType::Int),
            "INSERT EDGE `follow`(`degree`,`note`) VALUES \
             1->2@7: (0.5, \"a\\\"b\"), 3->4: (1, NULL)"
        );
        assert!(render_batch("follow", &batch, VidType::String).contains("\"1\"->\"2\"@7"));
    }

    #[test]
    fn test_vertex_statement_with_policy() {
        let mut tag = TagConfig::new("player", EndpointConfig::field("id").with_policy(KeyPolicy::Hash));
        tag.fields = vec!["born".into(), "seen".into(), "active".into()];
        let batch = single(
            RecordLayout::for_tag(&tag),
            GraphRecord::vertex(
                "alice",
                vec![
                    PropertyValue::Date(0),
                    PropertyValue::Timestamp(1_500_000),
                    PropertyValue::Bool(true),
                ],
            ),
        );
        assert_eq!(
            render_batch("player", &batch, VidType::Int),
            "INSERT VERTEX `player`(`born`,`seen`,`active`) VALUES \
             hash(\"alice\"): (date(\"1970-01-01\"), 1, true)"
        );
    }

    #[test]
    fn test_spatial_fan_out() {
        let config = EdgeConfig::new(
            "near",
            EndpointConfig::spatial(SpatialConfig::new("lat", "lng").with_levels(10, 12)),
            EndpointConfig::field("poi").with_policy(KeyPolicy::Uuid),
        );
        let batch = single(
            RecordLayout::for_edge(&config),
            GraphRecord::edge("11,12,13", "p1", None, vec![]),
        );
        assert_eq!(
            render_batch("near", &batch, VidType::Int),
            "INSERT EDGE `near`() VALUES \
             11->uuid(\"p1\"): (), 12->uuid(\"p1\"): (), 13->uuid(\"p1\"): ()"
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(render_value(&PropertyValue::Float(1.0)), "1.0");
        assert_eq!(render_value(&PropertyValue::Float(f64::NAN)), "NULL");
        assert_eq!(render_value(&PropertyValue::Date(19_000)), "date(\"2022-01-08\")");
        assert_eq!(render_value(&PropertyValue::Timestamp(-1)), "-1");
        assert_eq!(quote("line\nbreak\\"), "\"line\\nbreak\\\\\"");
    }
}
