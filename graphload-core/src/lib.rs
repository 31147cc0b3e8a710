//! Bulk loading of tabular rows into a graph store.
//!
//! Rows arrive as [`graphload_tabular::ColumnBatch`]es, one stream per
//! partition. Each partition runs the same pipeline:
//!
//! ```text
//! rows → RecordBuilder → Batcher → RateLimiter → AsyncWriteCoordinator → GraphWriter
//!                                        │                  │
//!                                        └──── ErrorSink ───┴── CheckpointStore
//! ```
//!
//! - [`RecordBuilder`] turns a row into an edge or vertex [`GraphRecord`].
//! - [`Batcher`] groups records into fixed-size [`RecordBatch`]es.
//! - [`RateLimiter`] admits or throttles each batch.
//! - [`AsyncWriteCoordinator`] keeps a bounded window of in-flight writes and
//!   reconciles it into [`LoadCounters`], the [`ErrorSink`] and checkpoints.
//! - [`PartitionOrchestrator`] owns the writer and drives one partition from
//!   start to close; [`LoadJob`] runs many partitions in parallel.

pub mod batch;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod counters;
pub mod error;
pub mod error_sink;
pub mod job;
pub mod partition;
pub mod rate_limit;
pub mod record;
pub mod reload;
pub mod spatial;
pub mod statement;
pub mod writer;

pub use batch::{Batcher, RecordBatch};
pub use builder::{RecordBuilder, RecordLayout};
pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, PartitionKey};
pub use config::{
    CheckpointConfig, EdgeConfig, EndpointConfig, ErrorConfig, KeyPolicy, LoadConfig,
    RateLimitConfig, SourceCategory, SpatialConfig, TagConfig, VidType,
};
pub use coordinator::{AsyncWriteCoordinator, AttemptState, WindowSummary, WriteAttempt};
pub use counters::{CounterSnapshot, LoadCounters};
pub use error::{LoadError, Result, WriteError};
pub use error_sink::{ErrorLog, ErrorSink, FileErrorLog, MemoryErrorLog};
pub use job::{JobSummary, LoadJob, PartitionOutcome};
pub use partition::{PartitionOrchestrator, PartitionPlan, PartitionReport, PartitionState};
pub use rate_limit::RateLimiter;
pub use record::{GraphRecord, PropertyValue, RecordKind};
pub use reload::{read_statements, reload, ReloadReport};
pub use spatial::{CellIndexer, S2CellIndexer};
pub use writer::{write_batch, GraphWriter, WriteResult, WriterFactory};
