//! Fixed-size grouping of records into write batches.

use std::sync::Arc;

use crate::builder::RecordLayout;
use crate::record::{GraphRecord, RecordKind};

/// An ordered group of records of one entity type, written as one attempt.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub layout: Arc<RecordLayout>,
    /// Property names the record values line up with.
    pub property_names: Arc<[String]>,
    pub records: Vec<GraphRecord>,
}

impl RecordBatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn kind(&self) -> RecordKind {
        self.layout.kind
    }

    /// Edge type or tag name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.layout.name
    }
}

/// Accumulates records and hands out full batches.
///
/// Records keep their arrival order. Only the batch returned by
/// [`Batcher::finish`] may be shorter than the configured size.
#[derive(Debug)]
pub struct Batcher {
    layout: Arc<RecordLayout>,
    property_names: Arc<[String]>,
    batch_size: usize,
    pending: Vec<GraphRecord>,
}

impl Batcher {
    pub fn new(layout: Arc<RecordLayout>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let property_names: Arc<[String]> = layout.property_names().into();
        Self {
            layout,
            property_names,
            batch_size,
            pending: Vec::with_capacity(batch_size),
        }
    }

    /// Add a record; returns a batch once `batch_size` records are pending.
    pub fn push(&mut self, record: GraphRecord) -> Option<RecordBatch> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Flush whatever is pending.
    pub fn finish(&mut self) -> Option<RecordBatch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    /// Number of records waiting for the next batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn take(&mut self) -> RecordBatch {
        let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        RecordBatch {
            layout: Arc::clone(&self.layout),
            property_names: Arc::clone(&self.property_names),
            records,
        }
    }
}
