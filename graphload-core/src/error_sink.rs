//! Bounded buffer of replayable statements for failed writes.
//!
//! The [`ErrorSink`] lives inside one partition. It is flushed to an
//! [`ErrorLog`] at batch boundaries; once the partition has appended
//! `max_errors` statements, the next append fails with
//! [`LoadError::TooManyErrors`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;

use crate::error::{LoadError, Result};

/// Append-only durable destination for statements, keyed by entity name.
#[async_trait]
pub trait ErrorLog: fmt::Debug + Send + Sync {
    async fn append(&self, entity: &str, partition: u32, statements: &[String]) -> Result<()>;
}

// ============================================================================
// ErrorSink
// ============================================================================

#[derive(Debug)]
pub struct ErrorSink {
    entity: String,
    partition: u32,
    max_errors: usize,
    buffer: Vec<String>,
    appended: usize,
}

impl ErrorSink {
    pub fn new(entity: impl Into<String>, partition: u32, max_errors: usize) -> Self {
        Self {
            entity: entity.into(),
            partition,
            max_errors,
            buffer: Vec::new(),
            appended: 0,
        }
    }

    /// Buffer one statement.
    ///
    /// Fails without storing the statement when the cap has been reached.
    pub fn append(&mut self, statement: String) -> Result<()> {
        if self.appended >= self.max_errors {
            return Err(LoadError::TooManyErrors {
                max: self.max_errors,
            });
        }
        self.buffer.push(statement);
        self.appended += 1;
        Ok(())
    }

    /// Persist and clear the buffer. Returns the number of statements written.
    pub async fn flush(&mut self, log: &dyn ErrorLog) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        log.append(&self.entity, self.partition, &self.buffer).await?;
        let n = self.buffer.len();
        self.buffer.clear();
        tracing::debug!(
            entity = %self.entity,
            partition = self.partition,
            statements = n,
            total = self.appended,
            "flushed error log"
        );
        Ok(n)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Statements waiting for the next flush.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Statements appended over the partition's lifetime.
    #[inline]
    pub fn appended(&self) -> usize {
        self.appended
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Appends to `<base>/<entity>.<partition>`, one statement per line.
#[derive(Debug, Clone)]
pub struct FileErrorLog {
    base_path: PathBuf,
}

impl FileErrorLog {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn log_path(&self, entity: &str, partition: u32) -> PathBuf {
        self.base_path.join(format!("{entity}.{partition}"))
    }
}

#[async_trait]
impl ErrorLog for FileErrorLog {
    async fn append(&self, entity: &str, partition: u32, statements: &[String]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await.map_err(|e| {
            LoadError::error_log(format!(
                "Failed to create directory {:?}: {}",
                self.base_path, e
            ))
        })?;
        let path = self.log_path(entity, partition);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| LoadError::error_log(format!("Failed to open {:?}: {}", path, e)))?;

        let mut content = String::new();
        for statement in statements {
            content.push_str(statement);
            content.push('\n');
        }
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| LoadError::error_log(format!("Failed to write {:?}: {}", path, e)))?;
        file.flush()
            .await
            .map_err(|e| LoadError::error_log(format!("Failed to flush {:?}: {}", path, e)))?;
        Ok(())
    }
}

// ============================================================================
// Memory backend
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryErrorLog {
    entries: Arc<RwLock<HashMap<(String, u32), Vec<String>>>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements logged for one entity and partition, in append order.
    pub fn statements(&self, entity: &str, partition: u32) -> Vec<String> {
        self.entries
            .read()
            .get(&(entity.to_string(), partition))
            .cloned()
            .unwrap_or_default()
    }

    /// Total statements across all keys.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ErrorLog for MemoryErrorLog {
    async fn append(&self, entity: &str, partition: u32, statements: &[String]) -> Result<()> {
        self.entries
            .write()
            .entry((entity.to_string(), partition))
            .or_default()
            .extend_from_slice(statements);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cap_is_cumulative() {
        let log = MemoryErrorLog::new();
        let mut sink = ErrorSink::new("follow", 0, 3);
        sink.append("a".into()).unwrap();
        sink.append("b".into()).unwrap();
        assert_eq!(sink.flush(&log).await.unwrap(), 2);
        assert!(sink.is_empty());

        sink.append("c".into()).unwrap();
        let err = sink.append("d".into()).unwrap_err();
        assert!(matches!(err, LoadError::TooManyErrors { max: 3 }));
        assert_eq!(sink.buffered(), 1);
        assert_eq!(sink.appended(), 3);

        sink.flush(&log).await.unwrap();
        assert_eq!(log.statements("follow", 0), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_zero_cap_rejects_first_append() {
        let mut sink = ErrorSink::new("t", 0, 0);
        assert!(sink.append("x".into()).is_err());
        assert_eq!(sink.flush(&MemoryErrorLog::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_log_appends_lines() {
        let dir = TempDir::new().unwrap();
        let log = FileErrorLog::new(dir.path().join("errors"));
        log.append("follow", 2, &["s1".into(), "s2".into()])
            .await
            .unwrap();
        log.append("follow", 2, &["s3".into()]).await.unwrap();
        log.append("player", 0, &["v1".into()]).await.unwrap();

        let content = std::fs::read_to_string(log.log_path("follow", 2)).unwrap();
        assert_eq!(content, "s1\ns2\ns3\n");
        let content = std::fs::read_to_string(dir.path().join("errors").join("player.0")).unwrap();
        assert_eq!(content, "v1\n");
    }
}
