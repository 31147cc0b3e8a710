//! Statement-file writer backend.
//!
//! Writes each batch as one statement line instead of sending it to a live
//! store, so a load can be inspected or piped into a console client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use graphload_core::{GraphWriter, RecordBatch, VidType, WriteError, WriteResult, WriterFactory};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends statements to one file. Exclusive to one partition.
#[derive(Debug)]
pub struct StatementFileWriter {
    path: PathBuf,
    vid_type: VidType,
    file: Mutex<Option<tokio::fs::File>>,
}

impl StatementFileWriter {
    pub fn new(path: impl Into<PathBuf>, vid_type: VidType) -> Self {
        Self {
            path: path.into(),
            vid_type,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, statement: &str) -> WriteResult {
        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| WriteError::Connection("statement file is not open".to_string()))?;
        let mut line = String::with_capacity(statement.len() + 1);
        line.push_str(statement);
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| WriteError::Connection(format!("write {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl GraphWriter for StatementFileWriter {
    async fn prepare(&self) -> WriteResult {
        let mut guard = self.file.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WriteError::Connection(format!("create {}: {e}", parent.display()))
            })?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| WriteError::Connection(format!("open {}: {e}", self.path.display())))?;
        *guard = Some(file);
        Ok(())
    }

    async fn write_edges(&self, batch: &RecordBatch) -> WriteResult {
        self.append(&self.to_execute_sentence(batch.name(), batch))
            .await
    }

    async fn write_vertices(&self, batch: &RecordBatch) -> WriteResult {
        self.append(&self.to_execute_sentence(batch.name(), batch))
            .await
    }

    async fn execute(&self, statement: &str) -> WriteResult {
        self.append(statement).await
    }

    fn vid_type(&self) -> VidType {
        self.vid_type
    }

    async fn close(&self) -> WriteResult {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush()
                .await
                .map_err(|e| WriteError::Connection(format!("flush {}: {e}", self.path.display())))?;
        }
        Ok(())
    }
}

/// Opens `<dir>/<entity>.<partition>.ngql` per partition.
#[derive(Debug, Clone)]
pub struct StatementFileFactory {
    dir: PathBuf,
    vid_type: VidType,
}

impl StatementFileFactory {
    pub fn new(dir: impl Into<PathBuf>, vid_type: VidType) -> Self {
        Self {
            dir: dir.into(),
            vid_type,
        }
    }

    pub fn statement_path(&self, entity: &str, partition: u32) -> PathBuf {
        self.dir.join(format!("{entity}.{partition}.ngql"))
    }
}

#[async_trait]
impl WriterFactory for StatementFileFactory {
    async fn connect(
        &self,
        entity: &str,
        partition: u32,
    ) -> Result<Arc<dyn GraphWriter>, WriteError> {
        Ok(Arc::new(StatementFileWriter::new(
            self.statement_path(entity, partition),
            self.vid_type,
        )))
    }
}
