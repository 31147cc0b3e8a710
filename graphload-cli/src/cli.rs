use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "graphload", about = "Bulk load tabular rows into a graph store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the load config file
    #[arg(long, short = 'c', global = true, env = "GRAPHLOAD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load rows from a JSON-lines file
    Load {
        /// Input file, one JSON object per line ("-" for stdin)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Directory receiving one statement file per entity and partition
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Validate a config file and print its effective settings
    Check,

    /// Replay an error log
    Reload {
        /// Error log file, named `<entity>.<partition>`
        log: PathBuf,

        /// Directory receiving the replayed statements
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}
