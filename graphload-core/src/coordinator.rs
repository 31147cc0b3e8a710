//! In-flight window of asynchronous write attempts.
//!
//! Admitted batches are spawned as independent write tasks. The window is
//! full once its outstanding attempts cover `capacity` records; every attempt
//! carries at least one record, so it never holds more than `capacity`
//! attempts. The submit that fills the window joins every attempt in it and
//! reconciles the results:
//!
//! 1. one success or failure count per attempt, in dispatch order
//! 2. the statement of every failed attempt goes to the [`ErrorSink`]
//!    (or aborts the partition in a strict category)
//! 3. the checkpoint advances by the source rows the window covered, unless
//!    the window raised a fatal error
//!
//! Throttled batches never reach the store. They are reconciled on the spot
//! as failures, but their rows still count toward the window's checkpoint
//! coverage.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::batch::RecordBatch;
use crate::checkpoint::{CheckpointStore, PartitionKey};
use crate::counters::LoadCounters;
use crate::error::{LoadError, Result, WriteError};
use crate::error_sink::ErrorSink;
use crate::writer::{write_batch, GraphWriter, WriteResult};

/// Poll interval while waiting for abandoned attempts on shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

/// Lifecycle of one write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Admitted,
    Throttled,
    Succeeded,
    Failed,
}

/// One batch submitted once to the store.
#[derive(Debug)]
pub struct WriteAttempt {
    pub id: u64,
    pub batch: Arc<RecordBatch>,
    /// Source rows this attempt accounts for, including skipped rows
    /// that preceded it.
    pub rows: u64,
    pub state: AttemptState,
}

impl WriteAttempt {
    fn new(id: u64, batch: RecordBatch, rows: u64) -> Self {
        Self {
            id,
            batch: Arc::new(batch),
            rows,
            state: AttemptState::Pending,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    attempt: WriteAttempt,
    handle: JoinHandle<WriteResult>,
}

/// Outcome counts of one reconciled window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowSummary {
    pub attempts: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Source rows covered, throttled attempts included.
    pub rows: u64,
}

#[derive(Debug)]
struct CheckpointTarget {
    store: Arc<dyn CheckpointStore>,
    key: PartitionKey,
}

/// Per-partition write dispatcher.
#[derive(Debug)]
pub struct AsyncWriteCoordinator {
    name: String,
    writer: Arc<dyn GraphWriter>,
    /// Records the window covers before it is reconciled.
    capacity: usize,
    strict: bool,
    counters: Arc<LoadCounters>,
    checkpoint: Option<CheckpointTarget>,
    /// Cumulative rows reconciled, starting at the resumed offset.
    offset: u64,
    window: Vec<InFlight>,
    /// Outcomes already known for this window (throttled attempts).
    settled: WindowSummary,
    next_id: u64,
    reconciliations: usize,
}

impl AsyncWriteCoordinator {
    pub fn new(
        name: impl Into<String>,
        writer: Arc<dyn GraphWriter>,
        capacity: usize,
        counters: Arc<LoadCounters>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            writer,
            capacity,
            strict: false,
            counters,
            checkpoint: None,
            offset: 0,
            window: Vec::with_capacity(capacity),
            settled: WindowSummary::default(),
            next_id: 0,
            reconciliations: 0,
        }
    }

    /// Abort on the first failed attempt instead of logging it.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Persist progress under `key` after every reconciliation, counting
    /// from `offset`.
    pub fn with_checkpoint(
        mut self,
        store: Arc<dyn CheckpointStore>,
        key: PartitionKey,
        offset: u64,
    ) -> Self {
        self.checkpoint = Some(CheckpointTarget { store, key });
        self.offset = offset;
        self
    }

    /// Dispatch an admitted batch. Blocks only when this attempt fills the
    /// window.
    pub async fn submit(
        &mut self,
        batch: RecordBatch,
        rows: u64,
        sink: &mut ErrorSink,
    ) -> Result<()> {
        let mut attempt = WriteAttempt::new(self.next_id, batch, rows);
        self.next_id += 1;
        attempt.state = AttemptState::Admitted;

        let writer = Arc::clone(&self.writer);
        let batch = Arc::clone(&attempt.batch);
        let handle = tokio::spawn(async move { write_batch(writer.as_ref(), &batch).await });
        self.window.push(InFlight { attempt, handle });

        if self.window_records() >= self.capacity {
            self.reconcile(sink).await?;
        }
        Ok(())
    }

    /// Record a batch the rate limiter denied.
    pub fn record_throttled(
        &mut self,
        batch: RecordBatch,
        rows: u64,
        sink: &mut ErrorSink,
    ) -> Result<()> {
        let mut attempt = WriteAttempt::new(self.next_id, batch, rows);
        self.next_id += 1;
        attempt.state = AttemptState::Throttled;
        tracing::warn!(
            name = %self.name,
            attempt = attempt.id,
            records = attempt.batch.len(),
            "write throttled"
        );
        self.settled.attempts += 1;
        self.settled.rows += rows;
        self.fail(&mut attempt, "throttled by rate limiter", sink)
    }

    /// Account for source rows that produced no record (skipped rows after
    /// the last batch) so the next checkpoint includes them.
    pub fn cover_rows(&mut self, rows: u64) {
        self.settled.rows += rows;
    }

    /// Join and reconcile whatever is left in the window.
    pub async fn drain(&mut self, sink: &mut ErrorSink) -> Result<WindowSummary> {
        if self.window.is_empty() && self.settled == WindowSummary::default() {
            return Ok(WindowSummary::default());
        }
        self.reconcile(sink).await
    }

    /// Wait for outstanding attempts and count their outcomes, without
    /// logging statements or advancing the checkpoint.
    ///
    /// Used on abort: a submitted write always runs to completion before the
    /// writer is released.
    pub async fn shutdown(&mut self) {
        while !self.window.iter().all(|f| f.handle.is_finished()) {
            tracing::debug!(
                name = %self.name,
                outstanding = self.window.iter().filter(|f| !f.handle.is_finished()).count(),
                "waiting for in-flight writes"
            );
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
        for in_flight in std::mem::take(&mut self.window) {
            let records = in_flight.attempt.batch.len() as u64;
            match in_flight.handle.await {
                Ok(Ok(())) => self.counters.record_success(records),
                _ => self.counters.record_failure(records),
            }
        }
        self.settled = WindowSummary::default();
    }

    /// Cumulative rows reconciled so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of window reconciliations performed.
    pub fn reconciliations(&self) -> usize {
        self.reconciliations
    }

    /// Attempts created, admitted or throttled.
    pub fn attempts(&self) -> u64 {
        self.next_id
    }

    /// Attempts currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    fn window_records(&self) -> usize {
        self.window.iter().map(|f| f.attempt.batch.len()).sum()
    }

    /// Every joined attempt is counted before the first fatal error is
    /// returned.
    async fn reconcile(&mut self, sink: &mut ErrorSink) -> Result<WindowSummary> {
        let window = std::mem::take(&mut self.window);
        let mut summary = std::mem::take(&mut self.settled);
        let (attempts, handles): (Vec<_>, Vec<_>) = window
            .into_iter()
            .map(|f| (f.attempt, f.handle))
            .unzip();
        let results = futures::future::join_all(handles).await;

        let mut fatal = None;
        for (mut attempt, joined) in attempts.into_iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                Err(WriteError::Connection(format!("write task failed: {e}")))
            });
            summary.attempts += 1;
            summary.rows += attempt.rows;
            match result {
                Ok(()) => {
                    attempt.state = AttemptState::Succeeded;
                    summary.succeeded += 1;
                    self.counters.record_success(attempt.batch.len() as u64);
                }
                Err(e) => {
                    let reason = e.to_string();
                    if let Err(err) = self.fail(&mut attempt, &reason, sink) {
                        fatal.get_or_insert(err);
                    }
                }
            }
        }
        summary.failed = summary.attempts - summary.succeeded;
        self.reconciliations += 1;
        if let Some(err) = fatal {
            return Err(err);
        }

        self.offset += summary.rows;
        if let Some(cp) = &self.checkpoint {
            cp.store.write(&cp.key, self.offset).await?;
        }
        tracing::debug!(
            name = %self.name,
            attempts = summary.attempts,
            succeeded = summary.succeeded,
            failed = summary.failed,
            offset = self.offset,
            "window reconciled"
        );
        Ok(summary)
    }

    fn fail(&self, attempt: &mut WriteAttempt, reason: &str, sink: &mut ErrorSink) -> Result<()> {
        attempt.state = AttemptState::Failed;
        let records = attempt.batch.len() as u64;
        self.counters.record_failure(records);
        if self.strict {
            tracing::error!(name = %self.name, attempt = attempt.id, records, reason, "write failed");
            return Err(LoadError::WriteAborted {
                name: self.name.clone(),
                reason: reason.to_string(),
            });
        }
        tracing::warn!(name = %self.name, attempt = attempt.id, records, reason, "write failed");
        sink.append(self.writer.to_execute_sentence(&self.name, &attempt.batch))
    }
}
