//! Client contract of the remote graph store.
//!
//! A [`GraphWriter`] is one connection owned by one partition. The pipeline
//! only ever calls it through `Arc<dyn GraphWriter>`, so a store client, a
//! statement file, or a test double can sit behind it.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::batch::RecordBatch;
use crate::config::VidType;
use crate::error::WriteError;
use crate::record::RecordKind;
use crate::statement;

/// Result of one write attempt.
pub type WriteResult = std::result::Result<(), WriteError>;

#[async_trait]
pub trait GraphWriter: Debug + Send + Sync {
    /// Acquire connection resources. Called once before the first write.
    async fn prepare(&self) -> WriteResult;

    async fn write_edges(&self, batch: &RecordBatch) -> WriteResult;

    async fn write_vertices(&self, batch: &RecordBatch) -> WriteResult;

    /// Execute one raw statement, e.g. a line replayed from an error log.
    async fn execute(&self, statement: &str) -> WriteResult;

    /// Key space type used when rendering statements.
    fn vid_type(&self) -> VidType {
        VidType::Int
    }

    /// Replayable statement equivalent to writing `batch` under `name`.
    fn to_execute_sentence(&self, name: &str, batch: &RecordBatch) -> String {
        statement::render_batch(name, batch, self.vid_type())
    }

    /// Release connection resources. Called once, also after failures.
    async fn close(&self) -> WriteResult {
        Ok(())
    }
}

/// Dispatch a batch to the edge or vertex write by its kind.
pub async fn write_batch(writer: &dyn GraphWriter, batch: &RecordBatch) -> WriteResult {
    match batch.kind() {
        RecordKind::Edge => writer.write_edges(batch).await,
        RecordKind::Vertex => writer.write_vertices(batch).await,
    }
}

/// Opens one exclusive writer per partition.
#[async_trait]
pub trait WriterFactory: Debug + Send + Sync {
    async fn connect(&self, entity: &str, partition: u32)
        -> std::result::Result<Arc<dyn GraphWriter>, WriteError>;
}
