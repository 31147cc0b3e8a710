//! Partition-parallel load driver.
//!
//! Each partition runs as its own tokio task with its own writer, limiter and
//! window. Partitions share nothing mutable except [`LoadCounters`]; a fatal
//! error ends only the partition that raised it.

use std::sync::Arc;

use futures::Stream;
use graphload_tabular::ColumnBatch;

use crate::builder::RecordLayout;
use crate::checkpoint::CheckpointStore;
use crate::config::{LoadConfig, SourceCategory};
use crate::counters::{CounterSnapshot, LoadCounters};
use crate::error::{LoadError, Result};
use crate::error_sink::ErrorLog;
use crate::partition::{PartitionOrchestrator, PartitionPlan, PartitionReport};
use crate::writer::WriterFactory;

/// Result of one partition task.
#[derive(Debug)]
pub struct PartitionOutcome {
    pub entity: String,
    pub partition: u32,
    pub result: Result<PartitionReport>,
}

/// Result of a whole job.
#[derive(Debug)]
pub struct JobSummary {
    pub outcomes: Vec<PartitionOutcome>,
    pub counters: CounterSnapshot,
}

impl JobSummary {
    /// Partitions that ended with an error.
    pub fn failed(&self) -> impl Iterator<Item = &PartitionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

#[derive(Debug, Clone)]
pub struct LoadJob {
    config: Arc<LoadConfig>,
    writers: Arc<dyn WriterFactory>,
    error_log: Arc<dyn ErrorLog>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    counters: Arc<LoadCounters>,
}

impl LoadJob {
    pub fn new(
        config: LoadConfig,
        writers: Arc<dyn WriterFactory>,
        error_log: Arc<dyn ErrorLog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            writers,
            error_log,
            checkpoint_store: None,
            counters: Arc::new(LoadCounters::new()),
        }
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn counters(&self) -> &Arc<LoadCounters> {
        &self.counters
    }

    /// Load every configured tag, then every configured edge, from one
    /// source batch split into each entity's partition count.
    pub async fn run(&self, input: &ColumnBatch) -> JobSummary {
        let mut outcomes = Vec::new();
        for tag in &self.config.tags {
            let layout = Arc::new(RecordLayout::for_tag(tag));
            outcomes.extend(
                self.run_batch(layout, tag.category, tag.partitions, input)
                    .await,
            );
        }
        for edge in &self.config.edges {
            let layout = Arc::new(RecordLayout::for_edge(edge));
            outcomes.extend(
                self.run_batch(layout, edge.category, edge.partitions, input)
                    .await,
            );
        }
        JobSummary {
            outcomes,
            counters: self.counters.snapshot(),
        }
    }

    /// Split `input` into `partitions` contiguous parts and load them in
    /// parallel.
    pub async fn run_batch(
        &self,
        layout: Arc<RecordLayout>,
        category: SourceCategory,
        partitions: usize,
        input: &ColumnBatch,
    ) -> Vec<PartitionOutcome> {
        let inputs = input
            .split(partitions)
            .into_iter()
            .map(|part| futures::stream::iter(vec![Ok(part)]))
            .collect();
        self.run_partitions(layout, category, inputs).await
    }

    /// Load one stream per partition, partition `i` reading `inputs[i]`.
    pub async fn run_partitions<S>(
        &self,
        layout: Arc<RecordLayout>,
        category: SourceCategory,
        inputs: Vec<S>,
    ) -> Vec<PartitionOutcome>
    where
        S: Stream<Item = Result<ColumnBatch>> + Send + Unpin + 'static,
    {
        tracing::info!(
            entity = %layout.name,
            kind = %layout.kind,
            partitions = inputs.len(),
            "loading"
        );
        let mut handles = Vec::with_capacity(inputs.len());
        for (partition, rows) in (0u32..).zip(inputs) {
            let plan =
                PartitionPlan::from_config(&self.config, Arc::clone(&layout), category, partition);
            let job = self.clone();
            handles.push(tokio::spawn(async move { job.run_one(plan, rows).await }));
        }

        let joined = futures::future::join_all(handles).await;
        (0u32..)
            .zip(joined)
            .map(|(partition, joined)| PartitionOutcome {
                entity: layout.name.clone(),
                partition,
                result: joined.unwrap_or_else(|e| Err(LoadError::Join(e.to_string()))),
            })
            .collect()
    }

    async fn run_one<S>(&self, plan: PartitionPlan, rows: S) -> Result<PartitionReport>
    where
        S: Stream<Item = Result<ColumnBatch>> + Send + Unpin,
    {
        let writer = self
            .writers
            .connect(&plan.layout.name, plan.key.partition)
            .await?;
        let mut orchestrator = PartitionOrchestrator::new(
            plan,
            writer,
            Arc::clone(&self.error_log),
            Arc::clone(&self.counters),
        );
        if let Some(store) = &self.checkpoint_store {
            orchestrator = orchestrator.with_checkpoint_store(Arc::clone(store));
        }
        orchestrator.run(rows).await
    }
}
