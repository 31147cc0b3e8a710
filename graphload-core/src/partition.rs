//! Per-partition load loop.
//!
//! A [`PartitionOrchestrator`] owns one writer connection, one rate limiter
//! and one in-flight window. It moves through
//! `Init → Streaming → Draining → Closed`; any fatal error ends it in
//! `Aborted` instead, after outstanding writes finish and the writer is
//! closed.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use graphload_tabular::ColumnBatch;
use tracing::Instrument;

use crate::batch::{Batcher, RecordBatch};
use crate::builder::{RecordBuilder, RecordLayout};
use crate::checkpoint::{CheckpointStore, PartitionKey};
use crate::config::{LoadConfig, RateLimitConfig, SourceCategory};
use crate::coordinator::AsyncWriteCoordinator;
use crate::counters::LoadCounters;
use crate::error::Result;
use crate::error_sink::{ErrorLog, ErrorSink};
use crate::rate_limit::RateLimiter;
use crate::writer::GraphWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Init,
    Streaming,
    Draining,
    Closed,
    Aborted,
}

/// Static settings of one partition run.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub layout: Arc<RecordLayout>,
    pub category: SourceCategory,
    /// Checkpoint key; its partition number also names the error log.
    pub key: PartitionKey,
    pub batch_size: usize,
    pub max_inflight: usize,
    pub rate_limit: RateLimitConfig,
    pub max_errors: usize,
    /// Any failed write aborts the partition.
    pub strict: bool,
    /// Resume from and persist checkpoints.
    pub checkpoint: bool,
}

impl PartitionPlan {
    /// Derive a plan from the load configuration.
    ///
    /// Checkpoint keys are `<checkpoint stream>.<entity name>`, so every
    /// entity type resumes independently.
    pub fn from_config(
        config: &LoadConfig,
        layout: Arc<RecordLayout>,
        category: SourceCategory,
        partition: u32,
    ) -> Self {
        let stream = match &config.checkpoint {
            Some(cp) => format!("{}.{}", cp.stream, layout.name),
            None => layout.name.clone(),
        };
        Self {
            key: PartitionKey::new(stream, partition),
            category,
            batch_size: config.batch_size,
            max_inflight: config.max_inflight,
            rate_limit: config.rate_limit.clone(),
            max_errors: config.errors.max_errors,
            strict: config.is_strict(category),
            checkpoint: config.checkpoints(category),
            layout,
        }
    }
}

/// What one partition run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Offset the run resumed from.
    pub resumed_from: u64,
    /// Rows read after the resume offset.
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub attempts: u64,
    /// Windows reconciled because a submit filled them.
    pub streaming_reconciliations: usize,
    /// Final partial window, 0 or 1.
    pub draining_reconciliations: usize,
    pub errors_logged: usize,
    /// Cumulative rows covered at the end of the run.
    pub offset: u64,
}

pub struct PartitionOrchestrator {
    plan: PartitionPlan,
    builder: RecordBuilder,
    writer: Arc<dyn GraphWriter>,
    error_log: Arc<dyn ErrorLog>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    counters: Arc<LoadCounters>,
    state: PartitionState,
}

impl std::fmt::Debug for PartitionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionOrchestrator")
            .field("key", &self.plan.key)
            .field("state", &self.state)
            .finish()
    }
}

impl PartitionOrchestrator {
    pub fn new(
        plan: PartitionPlan,
        writer: Arc<dyn GraphWriter>,
        error_log: Arc<dyn ErrorLog>,
        counters: Arc<LoadCounters>,
    ) -> Self {
        Self {
            builder: RecordBuilder::new(Arc::clone(&plan.layout)),
            plan,
            writer,
            error_log,
            checkpoint_store: None,
            counters,
            state: PartitionState::Init,
        }
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Replace the record builder, e.g. to use a different cell indexer.
    pub fn with_builder(mut self, builder: RecordBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn state(&self) -> PartitionState {
        self.state
    }

    /// Load every row of `rows` and release the writer.
    pub async fn run<S>(&mut self, rows: S) -> Result<PartitionReport>
    where
        S: Stream<Item = Result<ColumnBatch>> + Send + Unpin,
    {
        let span = tracing::info_span!(
            "partition",
            stream = %self.plan.key.stream,
            partition = self.plan.key.partition,
            kind = %self.plan.layout.kind,
        );
        self.run_inner(rows).instrument(span).await
    }

    async fn run_inner<S>(&mut self, rows: S) -> Result<PartitionReport>
    where
        S: Stream<Item = Result<ColumnBatch>> + Send + Unpin,
    {
        self.state = PartitionState::Init;
        if let Err(e) = self.writer.prepare().await {
            self.state = PartitionState::Aborted;
            tracing::error!(error = %e, "writer prepare failed");
            self.close_writer().await;
            return Err(e.into());
        }

        let resumed_from = match self.resume_offset().await {
            Ok(offset) => offset,
            Err(e) => {
                self.state = PartitionState::Aborted;
                tracing::error!(error = %e, "checkpoint read failed");
                self.close_writer().await;
                return Err(e);
            }
        };

        let mut pipeline = self.pipeline(resumed_from);
        let mut report = PartitionReport {
            resumed_from,
            ..Default::default()
        };

        self.state = PartitionState::Streaming;
        tracing::info!(resumed_from, category = %self.plan.category, "partition started");
        let mut outcome = pipeline.stream(rows, resumed_from, &mut report).await;
        let streamed = pipeline.coordinator.reconciliations();

        if outcome.is_ok() {
            self.state = PartitionState::Draining;
            outcome = pipeline.drain().await;
        }

        if let Err(e) = outcome {
            self.state = PartitionState::Aborted;
            tracing::error!(error = %e, "partition aborted");
            pipeline.abort().await;
            self.close_writer().await;
            return Err(e);
        }

        report.attempts = pipeline.coordinator.attempts();
        report.streaming_reconciliations = streamed;
        report.draining_reconciliations = pipeline.coordinator.reconciliations() - streamed;
        report.offset = pipeline.coordinator.offset();
        report.errors_logged = pipeline.sink.appended();
        self.close_writer().await;
        self.state = PartitionState::Closed;
        tracing::info!(
            rows = report.rows_read,
            skipped = report.rows_skipped,
            attempts = report.attempts,
            errors = report.errors_logged,
            offset = report.offset,
            "partition finished"
        );
        Ok(report)
    }

    async fn resume_offset(&self) -> Result<u64> {
        match (&self.checkpoint_store, self.plan.checkpoint) {
            (Some(store), true) => store.read(&self.plan.key).await,
            _ => Ok(0),
        }
    }

    fn pipeline(&self, resumed_from: u64) -> Pipeline {
        let plan = &self.plan;
        let mut coordinator = AsyncWriteCoordinator::new(
            plan.layout.name.clone(),
            Arc::clone(&self.writer),
            plan.max_inflight,
            Arc::clone(&self.counters),
        )
        .with_strict(plan.strict);
        if let (Some(store), true) = (&self.checkpoint_store, plan.checkpoint) {
            coordinator =
                coordinator.with_checkpoint(Arc::clone(store), plan.key.clone(), resumed_from);
        }
        Pipeline {
            builder: self.builder.clone(),
            batcher: Batcher::new(Arc::clone(&plan.layout), plan.batch_size),
            limiter: RateLimiter::new(plan.rate_limit.permits_per_sec),
            rate_limit: plan.rate_limit.clone(),
            coordinator,
            sink: ErrorSink::new(plan.layout.name.clone(), plan.key.partition, plan.max_errors),
            error_log: Arc::clone(&self.error_log),
            counters: Arc::clone(&self.counters),
            rows_since_batch: 0,
        }
    }

    async fn close_writer(&self) {
        if let Err(e) = self.writer.close().await {
            tracing::warn!(error = %e, "writer close failed");
        }
    }
}

/// Mutable state of one run, from the first row to the final drain.
struct Pipeline {
    builder: RecordBuilder,
    batcher: Batcher,
    limiter: RateLimiter,
    rate_limit: RateLimitConfig,
    coordinator: AsyncWriteCoordinator,
    sink: ErrorSink,
    error_log: Arc<dyn ErrorLog>,
    counters: Arc<LoadCounters>,
    /// Rows consumed since the last dispatched batch.
    rows_since_batch: u64,
}

impl Pipeline {
    async fn stream<S>(&mut self, mut rows: S, resume: u64, report: &mut PartitionReport) -> Result<()>
    where
        S: Stream<Item = Result<ColumnBatch>> + Send + Unpin,
    {
        let mut to_skip = resume;
        while let Some(chunk) = rows.next().await {
            let chunk = chunk?;
            let skip = usize::try_from(to_skip).unwrap_or(usize::MAX).min(chunk.num_rows);
            to_skip -= skip as u64;

            for row in chunk.rows().skip(skip) {
                report.rows_read += 1;
                self.rows_since_batch += 1;
                match self.builder.build(&row) {
                    Ok(record) => {
                        if let Some(batch) = self.batcher.push(record) {
                            self.dispatch(batch).await?;
                        }
                    }
                    Err(e) if e.is_skippable() => {
                        tracing::warn!(row = row.index(), error = %e, "skipping row");
                        report.rows_skipped += 1;
                        self.counters.record_skipped();
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if to_skip > 0 {
            tracing::warn!(remaining = to_skip, "input ended before the resume offset");
        }
        if let Some(batch) = self.batcher.finish() {
            self.dispatch(batch).await?;
        }
        Ok(())
    }

    /// Gate one batch through the rate limiter into the window, then flush
    /// the error buffer at the batch boundary.
    async fn dispatch(&mut self, batch: RecordBatch) -> Result<()> {
        let rows = std::mem::take(&mut self.rows_since_batch);
        if self.limiter.try_acquire(self.rate_limit.timeout()).await {
            self.coordinator.submit(batch, rows, &mut self.sink).await?;
        } else {
            self.coordinator.record_throttled(batch, rows, &mut self.sink)?;
        }
        self.sink.flush(self.error_log.as_ref()).await?;
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        let trailing = std::mem::take(&mut self.rows_since_batch);
        if trailing > 0 {
            self.coordinator.cover_rows(trailing);
        }
        let summary = self.coordinator.drain(&mut self.sink).await?;
        self.sink.flush(self.error_log.as_ref()).await?;
        tracing::debug!(
            attempts = summary.attempts,
            failed = summary.failed,
            "drained in-flight window"
        );
        Ok(())
    }

    /// Let submitted writes finish and keep whatever errors were buffered.
    async fn abort(&mut self) {
        self.coordinator.shutdown().await;
        if let Err(e) = self.sink.flush(self.error_log.as_ref()).await {
            tracing::warn!(error = %e, "error log flush failed during abort");
        }
    }
}
