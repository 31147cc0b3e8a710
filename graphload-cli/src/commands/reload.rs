use std::path::Path;

use colored::Colorize;
use graphload_core::{read_statements, reload, FileErrorLog, WriterFactory};

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::StatementFileFactory;

/// Split an error log file name `<entity>.<partition>`.
pub fn parse_log_name(path: &Path) -> CliResult<(String, u32)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CliError::Usage(format!("invalid error log path {}", path.display())))?;
    let (entity, partition) = name.rsplit_once('.').ok_or_else(|| {
        CliError::Usage(format!("error log '{name}' is not named <entity>.<partition>"))
    })?;
    let partition = partition.parse::<u32>().map_err(|_| {
        CliError::Usage(format!("error log '{name}' has no partition number"))
    })?;
    if entity.is_empty() {
        return Err(CliError::Usage(format!("error log '{name}' has no entity name")));
    }
    Ok((entity.to_string(), partition))
}

pub async fn run(config: &CliConfig, log: &Path, output: &Path, quiet: bool) -> CliResult<()> {
    let (entity, partition) = parse_log_name(log)?;
    let statements = read_statements(log).await?;
    tracing::info!(entity, partition, statements = statements.len(), "replaying error log");

    let factory = StatementFileFactory::new(output, config.load.vid_type);
    let writer = factory
        .connect(&entity, partition)
        .await
        .map_err(|e| CliError::Output(e.to_string()))?;
    let failures = FileErrorLog::new(config.load.errors.path.join("reload"));

    let report = reload(
        writer.as_ref(),
        statements,
        &failures,
        &entity,
        partition,
    )
    .await?;

    if !quiet {
        println!(
            "{} {entity}.{partition}: {} replayed, {} failed",
            "reloaded".green().bold(),
            report.succeeded,
            report.failed
        );
    }
    if report.failed > 0 {
        return Err(CliError::Partial {
            failed: 1,
            total: 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_name() {
        assert_eq!(
            parse_log_name(Path::new("/tmp/errors/follow.3")).unwrap(),
            ("follow".to_string(), 3)
        );
        assert_eq!(
            parse_log_name(Path::new("player.v2.0")).unwrap(),
            ("player.v2".to_string(), 0)
        );
        assert!(matches!(
            parse_log_name(Path::new("follow")),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_log_name(Path::new("follow.x")),
            Err(CliError::Usage(_))
        ));
    }
}
