//! graphload CLI library.
//!
//! Command handlers behind the `graphload` binary. Loads read JSON-lines rows
//! and write statement files, one per entity and partition.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod output;

use cli::{Cli, Commands};

/// Dispatch a parsed [`Cli`] to its command handler.
pub async fn run(cli: Cli) -> error::CliResult<()> {
    let config_path = config::require_path(cli.config.as_deref())?;
    let config = config::load_config(config_path)?;

    match cli.command {
        Commands::Load { input, output } => {
            commands::load::run(config, &input, &output, cli.quiet).await
        }
        Commands::Check => commands::check::run(&config),
        Commands::Reload { log, output } => {
            commands::reload::run(&config, &log, &output, cli.quiet).await
        }
    }
}
