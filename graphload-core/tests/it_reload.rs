//! Error-log replay.

mod support;

use std::sync::Arc;

use futures::stream;
use graphload_core::{
    read_statements, reload, FileErrorLog, LoadCounters, MemoryErrorLog, PartitionOrchestrator,
    PartitionPlan, RecordLayout, SourceCategory,
};
use support::{config, edge_rows, follow_edge, ScriptedWriter};
use tempfile::TempDir;

#[tokio::test]
async fn test_failed_batches_replay_from_file_log() {
    let dir = TempDir::new().unwrap();
    let log = FileErrorLog::new(dir.path());

    let config = config(10, 4);
    let edge = follow_edge(SourceCategory::File);
    let plan = PartitionPlan::from_config(
        &config,
        Arc::new(RecordLayout::for_edge(&edge)),
        edge.category,
        0,
    );
    let writer = Arc::new(ScriptedWriter::failing_batches_starting_at(["10", "30"]));
    PartitionOrchestrator::new(
        plan,
        writer,
        Arc::new(log.clone()),
        Arc::new(LoadCounters::new()),
    )
    .run(stream::iter(vec![Ok(edge_rows(50))]))
    .await
    .unwrap();

    let statements = read_statements(&log.log_path("follow", 0)).await.unwrap();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].contains("10->1010"));
    assert!(statements[1].contains("30->1030"));

    // Second replay attempt still rejects the batch starting at 30.
    let replayer = ScriptedWriter::failing_execute_containing("30->1030");
    let failures = MemoryErrorLog::new();
    let report = reload(&replayer, statements.clone(), &failures, "follow", 0)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(replayer.executed(), statements);
    assert_eq!(failures.statements("follow", 0), vec![statements[1].clone()]);
}

#[tokio::test]
async fn test_read_statements_skips_blank_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("player.0");
    std::fs::write(&path, "INSERT VERTEX a\n\n  \nINSERT VERTEX b\n").unwrap();
    assert_eq!(
        read_statements(&path).await.unwrap(),
        vec!["INSERT VERTEX a", "INSERT VERTEX b"]
    );
    assert!(read_statements(&dir.path().join("missing")).await.is_err());
}
