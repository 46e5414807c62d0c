use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Simple, file-backed daily task tracker with Smart Score ranking.
/// Storage defaults to ~/.dayplan or a directory passed via --data-dir.
#[derive(Parser)]
#[command(name = "dp", version, about = "Daily task tracking CLI")]
pub struct Cli {
    /// Directory holding the task data files.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
