//! Replay of error logs.
//!
//! Every line of an error log is a complete statement. Replaying sends each
//! line through [`GraphWriter::execute`]; lines that fail again are written
//! to a fresh error log so the replay can itself be replayed.

use std::path::Path;

use crate::error::{LoadError, Result};
use crate::error_sink::ErrorLog;
use crate::writer::GraphWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub succeeded: u64,
    pub failed: u64,
}

/// Non-blank lines of an error log file, in order.
pub async fn read_statements(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::error_log(format!("Failed to read {:?}: {}", path, e)))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Execute `statements` in order, logging failures under `entity`/`partition`
/// of `failures`.
pub async fn reload(
    writer: &dyn GraphWriter,
    statements: Vec<String>,
    failures: &dyn ErrorLog,
    entity: &str,
    partition: u32,
) -> Result<ReloadReport> {
    writer.prepare().await?;
    let mut report = ReloadReport::default();
    let mut failed = Vec::new();
    for statement in statements {
        match writer.execute(&statement).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                tracing::warn!(entity, error = %e, "replayed statement failed");
                report.failed += 1;
                failed.push(statement);
            }
        }
    }
    let flushed = if failed.is_empty() {
        Ok(())
    } else {
        failures.append(entity, partition, &failed).await
    };
    if let Err(e) = writer.close().await {
        tracing::warn!(error = %e, "writer close failed");
    }
    flushed?;
    tracing::info!(
        entity,
        succeeded = report.succeeded,
        failed = report.failed,
        "reload finished"
    );
    Ok(report)
}
