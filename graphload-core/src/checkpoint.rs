//! Durable per-partition progress.
//!
//! A checkpoint is the cumulative number of source rows of one partition whose
//! writes have been reconciled. Offsets only move forward: a write carrying a
//! lower offset than the stored one is ignored.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// `(stream, partition)` checkpoint key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub stream: String,
    pub partition: u32,
}

impl PartitionKey {
    pub fn new(stream: impl Into<String>, partition: u32) -> Self {
        Self {
            stream: stream.into(),
            partition,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream, self.partition)
    }
}

/// Key-value store of partition offsets.
#[async_trait]
pub trait CheckpointStore: fmt::Debug + Send + Sync {
    /// Stored offset, 0 when nothing has been written yet.
    async fn read(&self, key: &PartitionKey) -> Result<u64>;

    /// Persist `offset`. Lower offsets than the stored one are ignored.
    async fn write(&self, key: &PartitionKey, offset: u64) -> Result<()>;
}

// ============================================================================
// File backend
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    stream: String,
    partition: u32,
    offset: u64,
}

/// One JSON file per key under a base directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    base_path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn checkpoint_path(&self, key: &PartitionKey) -> PathBuf {
        self.base_path
            .join(sanitize(&key.stream))
            .join(format!("{}.json", key.partition))
    }

    async fn read_file(&self, path: &Path) -> Result<Option<CheckpointFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::checkpoint(format!("Failed to read {:?}: {}", path, e)))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write to a `.tmp` sibling then rename over the target.
    async fn write_file_atomic(&self, path: &Path, value: &CheckpointFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LoadError::checkpoint(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }
        let content = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &content)
            .await
            .map_err(|e| LoadError::checkpoint(format!("Failed to write {:?}: {}", tmp_path, e)))?;
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            LoadError::checkpoint(format!(
                "Failed to rename {:?} to {:?}: {}",
                tmp_path, path, e
            ))
        })?;
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self, key: &PartitionKey) -> Result<u64> {
        let path = self.checkpoint_path(key);
        Ok(self.read_file(&path).await?.map_or(0, |cp| cp.offset))
    }

    async fn write(&self, key: &PartitionKey, offset: u64) -> Result<()> {
        let path = self.checkpoint_path(key);
        if let Some(existing) = self.read_file(&path).await? {
            if existing.offset >= offset {
                tracing::debug!(
                    partition = %key,
                    stored = existing.offset,
                    offset,
                    "ignoring non-advancing checkpoint"
                );
                return Ok(());
            }
        }
        let record = CheckpointFile {
            stream: key.stream.clone(),
            partition: key.partition,
            offset,
        };
        self.write_file_atomic(&path, &record).await
    }
}

// ============================================================================
// Memory backend
// ============================================================================

/// In-process store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    offsets: Arc<RwLock<HashMap<PartitionKey, u64>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key and offset currently stored.
    pub fn snapshot(&self) -> HashMap<PartitionKey, u64> {
        self.offsets.read().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn read(&self, key: &PartitionKey) -> Result<u64> {
        Ok(self.offsets.read().get(key).copied().unwrap_or(0))
    }

    async fn write(&self, key: &PartitionKey, offset: u64) -> Result<()> {
        let mut offsets = self.offsets.write();
        let entry = offsets.entry(key.clone()).or_insert(0);
        *entry = (*entry).max(offset);
        Ok(())
    }
}
