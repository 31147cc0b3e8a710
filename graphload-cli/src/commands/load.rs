use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use graphload_core::{FileCheckpointStore, FileErrorLog, JobSummary, LoadJob};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::input::read_json_lines_path;
use crate::output::StatementFileFactory;

pub async fn run(config: CliConfig, input: &Path, output: &Path, quiet: bool) -> CliResult<()> {
    config.load.log_effective_settings();

    let batch = read_json_lines_path(input, config.input.schema())?;
    tracing::info!(rows = batch.num_rows, input = %input.display(), "input read");

    let factory = StatementFileFactory::new(output, config.load.vid_type);
    let error_log = FileErrorLog::new(config.load.errors.path.clone());
    let checkpoint_path = config.load.checkpoint.as_ref().map(|cp| cp.path.clone());

    let mut job = LoadJob::new(config.load, Arc::new(factory), Arc::new(error_log));
    if let Some(path) = checkpoint_path {
        job = job.with_checkpoint_store(Arc::new(FileCheckpointStore::new(path)));
    }

    let summary = job.run(&batch).await;
    if !quiet {
        print_summary(&summary);
    }

    let failed = summary.failed().count();
    if failed > 0 {
        return Err(CliError::Partial {
            failed,
            total: summary.outcomes.len(),
        });
    }
    Ok(())
}

fn print_summary(summary: &JobSummary) {
    for outcome in &summary.outcomes {
        let label = format!("{}/{}", outcome.entity, outcome.partition);
        match &outcome.result {
            Ok(report) => println!(
                "{} {label}: {} rows, {} batches, {} errors logged, offset {}",
                "ok".green().bold(),
                report.rows_read,
                report.attempts,
                report.errors_logged,
                report.offset,
            ),
            Err(e) => println!("{} {label}: {e}", "failed".red().bold()),
        }
    }
    let c = &summary.counters;
    println!(
        "batches: {} succeeded, {} failed; records: {} written, {} failed; rows skipped: {}",
        c.batch_success, c.batch_failure, c.records_written, c.records_failed, c.rows_skipped,
    );
}
