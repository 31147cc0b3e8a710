//! Partition-parallel jobs.

mod support;

use std::sync::Arc;

use graphload_core::{
    EndpointConfig, LoadError, LoadJob, MemoryErrorLog, SourceCategory, TagConfig,
};
use support::{config, edge_rows, follow_edge, ScriptedFactory, ScriptedWriter};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partitions_cover_input_once() {
    let mut config = config(25, 4);
    let mut edge = follow_edge(SourceCategory::File);
    edge.partitions = 4;
    config.edges.push(edge);

    let writers: Vec<Arc<ScriptedWriter>> = (0..4).map(|_| Arc::new(ScriptedWriter::new())).collect();
    let job = LoadJob::new(
        config,
        Arc::new(ScriptedFactory::new(writers.clone())),
        Arc::new(MemoryErrorLog::new()),
    );

    let summary = job.run(&edge_rows(1000)).await;
    assert!(summary.is_success());
    assert_eq!(summary.outcomes.len(), 4);

    let mut keys: Vec<i64> = writers.iter().flat_map(|w| w.written_keys()).collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..1000).collect::<Vec<i64>>());
    // Contiguous, non-overlapping parts.
    assert_eq!(writers[1].written_keys().first(), Some(&250));

    assert_eq!(summary.counters.batch_success, 40);
    assert_eq!(summary.counters.records_written, 1000);
    for outcome in &summary.outcomes {
        assert_eq!(outcome.entity, "follow");
        assert_eq!(outcome.result.as_ref().unwrap().rows_read, 250);
    }
}

#[tokio::test]
async fn test_failed_partition_does_not_stop_others() {
    let mut config = config(50, 10);
    let mut edge = follow_edge(SourceCategory::File);
    edge.partitions = 3;
    config.edges.push(edge);

    let writers = vec![
        Arc::new(ScriptedWriter::new()),
        Arc::new(ScriptedWriter::failing_prepare()),
        Arc::new(ScriptedWriter::new()),
    ];
    let job = LoadJob::new(
        config,
        Arc::new(ScriptedFactory::new(writers.clone())),
        Arc::new(MemoryErrorLog::new()),
    );

    let summary = job.run(&edge_rows(300)).await;
    assert!(!summary.is_success());
    let failed: Vec<u32> = summary.failed().map(|o| o.partition).collect();
    assert_eq!(failed, vec![1]);
    assert!(matches!(summary.outcomes[1].result, Err(LoadError::Writer(_))));
    assert_eq!(writers[0].written_keys().len(), 100);
    assert_eq!(writers[2].written_keys().len(), 100);
    assert_eq!(summary.counters.records_written, 200);
}

#[tokio::test]
async fn test_tags_load_before_edges() {
    let mut config = config(100, 10);
    config.edges.push(follow_edge(SourceCategory::File));
    let mut tag = TagConfig::new("player", EndpointConfig::field("src"));
    tag.fields = vec!["weight".into()];
    config.tags.push(tag);

    let writer = Arc::new(ScriptedWriter::new());
    let job = LoadJob::new(
        config,
        Arc::new(ScriptedFactory::new(vec![Arc::clone(&writer)])),
        Arc::new(MemoryErrorLog::new()),
    );
    let summary = job.run(&edge_rows(10)).await;

    let entities: Vec<&str> = summary.outcomes.iter().map(|o| o.entity.as_str()).collect();
    assert_eq!(entities, vec!["player", "follow"]);
    assert_eq!(summary.counters.batch_success, 2);
    assert_eq!(writer.calls(), 2);
}
