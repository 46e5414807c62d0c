//! # dp - Daily task tracking CLI
//!
//! A single-user task tracker that persists to local JSON files and ranks
//! tasks by Smart Score, a weighted blend of priority, deadline urgency,
//! Eisenhower quadrant, and effort.
//!
//! ```bash
//! # Add a task
//! dp add "Write quarterly report" "Board meeting Friday" --eta tomorrow --priority 80
//!
//! # Today's tasks, ranked
//! dp list
//!
//! # Mark done / comment / search
//! dp done 3
//! dp comment 3 "sent for review"
//! dp search report
//! ```
//!
//! Data lives in `~/.dayplan/` as three JSON files: the collection, a
//! one-generation backup taken before every write, and settings.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod cmd;
pub mod error;
pub mod fields;
pub mod repo;
pub mod score;
pub mod store;
pub mod task;

use cli::Cli;
use cmd::*;
use repo::Repository;
use store::{FileBackend, Store};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions don't need storage.
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".dayplan")
    });

    let mut store = Store::new(FileBackend::new(data_dir));
    // Create-or-migrate on startup so every command sees a valid collection.
    store.initialize();
    let mut repo = Repository::new(store);

    match cli.command {
        Commands::Completions { .. } => unreachable!("handled above"),

        Commands::Add {
            name,
            why,
            eta,
            time,
            priority,
            quadrant,
        } => cmd_add(&mut repo, name, why, eta, time, priority, quadrant),

        Commands::List { date, all } => cmd_list(&mut repo, date, all),

        Commands::View { id } => cmd_view(&mut repo, id),

        Commands::Update {
            id,
            name,
            why,
            eta,
            time,
            priority,
            quadrant,
            clear_eta,
        } => cmd_update(&mut repo, id, name, why, eta, time, priority, quadrant, clear_eta),

        Commands::Done { id } => cmd_done(&mut repo, id, true),

        Commands::Reopen { id } => cmd_done(&mut repo, id, false),

        Commands::Delete { id } => cmd_delete(&mut repo, id),

        Commands::Comment { id, text } => cmd_comment(&mut repo, id, text),

        Commands::Reorder { ids } => cmd_reorder(&mut repo, ids),

        Commands::Stats { date } => cmd_stats(&mut repo, date),

        Commands::Search { query, from, to } => cmd_search(&mut repo, query, from, to),

        Commands::Export { output } => cmd_export(&mut repo, output),

        Commands::Import { input } => cmd_import(&mut repo, input),

        Commands::RestoreBackup => cmd_restore_backup(&mut repo),

        Commands::Clear { force } => cmd_clear(&mut repo, force),

        Commands::Settings { action } => cmd_settings(&mut repo, action),
    }
}
