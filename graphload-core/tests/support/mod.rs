//! Shared fakes for graphload-core integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphload_core::{
    EdgeConfig, EndpointConfig, GraphWriter, LoadConfig, RecordBatch, SourceCategory, WriteError,
    WriteResult, WriterFactory,
};
use graphload_tabular::{BatchSchema, Column, ColumnBatch, FieldInfo, FieldType};
use parking_lot::Mutex;

// =============================================================================
// Rows
// =============================================================================

/// `n` rows of `(src: int64, dst: int64, weight: float64)` with `src = i`,
/// `dst = i + 1000`.
pub fn edge_rows(n: usize) -> ColumnBatch {
    edge_rows_from(0, n)
}

pub fn edge_rows_from(start: usize, n: usize) -> ColumnBatch {
    let schema = Arc::new(BatchSchema::new(vec![
        FieldInfo::new("src", FieldType::Int64),
        FieldInfo::new("dst", FieldType::Int64),
        FieldInfo::new("weight", FieldType::Float64),
    ]));
    let ids = start as i64..(start + n) as i64;
    ColumnBatch::new(
        schema,
        vec![
            Column::Int64(ids.clone().map(Some).collect()),
            Column::Int64(ids.clone().map(|i| Some(i + 1000)).collect()),
            Column::Float64(ids.map(|i| Some(i as f64 / 2.0)).collect()),
        ],
    )
    .expect("valid batch")
}

/// A `follow` edge over [`edge_rows`] with `weight` as its only property.
pub fn follow_edge(category: SourceCategory) -> EdgeConfig {
    let mut edge = EdgeConfig::new(
        "follow",
        EndpointConfig::field("src"),
        EndpointConfig::field("dst"),
    );
    edge.category = category;
    edge.fields = vec!["weight".into()];
    edge
}

pub fn config(batch_size: usize, max_inflight: usize) -> LoadConfig {
    let mut config = LoadConfig::default();
    config.batch_size = batch_size;
    config.max_inflight = max_inflight;
    config.rate_limit.permits_per_sec = 1_000_000.0;
    config
}

// =============================================================================
// Scripted writer
// =============================================================================

/// Writer double that records every attempt and fails the ones its script
/// selects.
#[derive(Debug, Default)]
pub struct ScriptedWriter {
    /// Source keys of every batch written, in call order.
    batches: Mutex<Vec<Vec<String>>>,
    executed: Mutex<Vec<String>>,
    /// Batches whose first source key is listed here fail.
    fail_first_keys: HashSet<String>,
    fail_all: bool,
    /// Statements containing this text fail on `execute`.
    fail_execute_containing: Option<String>,
    delay: Option<Duration>,
    prepare_error: Option<WriteError>,
    pub prepared: AtomicBool,
    pub closed: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_all() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn failing_batches_starting_at<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_first_keys: keys.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn failing_prepare() -> Self {
        Self {
            prepare_error: Some(WriteError::Connection("refused".into())),
            ..Default::default()
        }
    }

    pub fn failing_execute_containing(text: &str) -> Self {
        Self {
            fail_execute_containing: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Batch sizes sorted by their first source key.
    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut batches = self.batches.lock().clone();
        batches.sort_by_key(|b| b.first().and_then(|k| k.parse::<i64>().ok()));
        batches.iter().map(Vec::len).collect()
    }

    /// Every source key written, sorted numerically.
    pub fn written_keys(&self) -> Vec<i64> {
        let mut keys: Vec<i64> = self
            .batches
            .lock()
            .iter()
            .flatten()
            .filter_map(|k| k.parse().ok())
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    async fn write(&self, batch: &RecordBatch) -> WriteResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let keys: Vec<String> = batch.records.iter().map(|r| r.source.clone()).collect();
        let first = keys.first().cloned().unwrap_or_default();
        self.batches.lock().push(keys);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all || self.fail_first_keys.contains(&first) {
            Err(WriteError::Rejected(format!("batch starting at {first}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GraphWriter for ScriptedWriter {
    async fn prepare(&self) -> WriteResult {
        self.prepared.store(true, Ordering::SeqCst);
        match &self.prepare_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn write_edges(&self, batch: &RecordBatch) -> WriteResult {
        self.write(batch).await
    }

    async fn write_vertices(&self, batch: &RecordBatch) -> WriteResult {
        self.write(batch).await
    }

    async fn execute(&self, statement: &str) -> WriteResult {
        self.executed.lock().push(statement.to_string());
        match &self.fail_execute_containing {
            Some(text) if statement.contains(text.as_str()) => {
                Err(WriteError::Rejected("replay rejected".into()))
            }
            _ => Ok(()),
        }
    }

    async fn close(&self) -> WriteResult {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out pre-built writers by partition number.
#[derive(Debug)]
pub struct ScriptedFactory {
    writers: Vec<Arc<ScriptedWriter>>,
}

impl ScriptedFactory {
    pub fn new(writers: Vec<Arc<ScriptedWriter>>) -> Self {
        Self { writers }
    }
}

#[async_trait]
impl WriterFactory for ScriptedFactory {
    async fn connect(
        &self,
        _entity: &str,
        partition: u32,
    ) -> Result<Arc<dyn GraphWriter>, WriteError> {
        self.writers
            .get(partition as usize)
            .map(|w| Arc::clone(w) as Arc<dyn GraphWriter>)
            .ok_or_else(|| WriteError::Connection(format!("no writer for partition {partition}")))
    }
}
