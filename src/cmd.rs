//! Command implementations for the CLI interface.
//!
//! Thin presentation glue: every handler goes through the repository and
//! prints plain tables. Nothing here touches the persisted blobs directly or
//! computes derived fields itself.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{json, Map, Value};

use crate::cli::Cli;
use crate::error::Error;
use crate::fields::Quadrant;
use crate::repo::Repository;
use crate::store::StorageBackend;
use crate::task::Task;

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task.
    Add {
        /// What needs doing.
        name: String,
        /// Why it matters.
        why: String,
        /// Deadline: RFC 3339, "YYYY-MM-DD HH:MM", "YYYY-MM-DD", "today",
        /// "tomorrow", or "in Nd".
        #[arg(long)]
        eta: Option<String>,
        /// Estimated minutes required (minimum 5).
        #[arg(long)]
        time: Option<i64>,
        /// Priority 1-100.
        #[arg(long)]
        priority: Option<i64>,
        /// Eisenhower quadrant: q1 | q2 | q3 | q4.
        #[arg(long, value_enum)]
        quadrant: Option<Quadrant>,
    },

    /// List tasks for a day (default today), ranked by Smart Score.
    List {
        /// Day to list: YYYY-MM-DD, "today", "tomorrow", or "yesterday".
        #[arg(long)]
        date: Option<String>,
        /// List every task regardless of day.
        #[arg(long)]
        all: bool,
    },

    /// View a single task with its comments.
    View { id: u64 },

    /// Update fields on a task.
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        why: Option<String>,
        #[arg(long)]
        eta: Option<String>,
        #[arg(long)]
        time: Option<i64>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long, value_enum)]
        quadrant: Option<Quadrant>,
        /// Remove the deadline.
        #[arg(long)]
        clear_eta: bool,
    },

    /// Mark a task completed.
    Done { id: u64 },

    /// Reopen a completed task.
    Reopen { id: u64 },

    /// Delete a task.
    Delete { id: u64 },

    /// Append a comment to a task.
    Comment { id: u64, text: String },

    /// Re-prioritize: listed tasks get priority 1, 2, ... in the given order.
    Reorder {
        /// Task ids in the desired order.
        ids: Vec<u64>,
    },

    /// Show aggregate stats, optionally for a single day.
    Stats {
        #[arg(long)]
        date: Option<String>,
    },

    /// Search name, why, and comments (case-insensitive substring).
    Search {
        query: String,
        /// Inclusive start of an owning-day range filter.
        #[arg(long)]
        from: Option<String>,
        /// Inclusive end of an owning-day range filter.
        #[arg(long)]
        to: Option<String>,
    },

    /// Export the full collection as a JSON snapshot.
    Export {
        /// Output file path (default: dayplan_export.json).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import a previously exported snapshot, replacing the collection.
    Import { input: PathBuf },

    /// Roll back to the backup snapshot taken before the last write.
    RestoreBackup,

    /// Delete all tasks (a backup snapshot of the current state is kept).
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Show or change settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings.
    Show,
    /// Change one or more settings.
    Set {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        auto_theme: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        sound_effects: Option<bool>,
    },
}

fn bail(e: Error) -> ! {
    eprintln!("Error: {e}");
    std::process::exit(1);
}

pub fn cmd_add<B: StorageBackend>(
    repo: &mut Repository<B>,
    name: String,
    why: String,
    eta: Option<String>,
    time: Option<i64>,
    priority: Option<i64>,
    quadrant: Option<Quadrant>,
) {
    let mut input = Map::new();
    input.insert("name".to_string(), json!(name));
    input.insert("why".to_string(), json!(why));
    if let Some(raw) = eta {
        match parse_eta_input(&raw) {
            Some(dt) => {
                input.insert("eta".to_string(), json!(dt));
            }
            None => {
                eprintln!("Unrecognized eta: {raw}");
                std::process::exit(1);
            }
        }
    }
    if let Some(t) = time {
        input.insert("timeRequired".to_string(), json!(t));
    }
    if let Some(p) = priority {
        input.insert("priority".to_string(), json!(p));
    }
    if let Some(q) = quadrant {
        input.insert("eisenhowerMatrix".to_string(), json!(q.as_str()));
    }

    match repo.add(&Value::Object(input)) {
        Ok(task) => {
            println!("Added task {} (score {:.1})", task.id, task.smart_score);
        }
        Err(e) => bail(e),
    }
}

pub fn cmd_list<B: StorageBackend>(repo: &mut Repository<B>, date: Option<String>, all: bool) {
    let mut tasks = if all {
        repo.get_all()
    } else {
        match date {
            Some(raw) => match parse_date_input(&raw) {
                Some(d) => repo.get_by_date(d),
                None => {
                    eprintln!("Unrecognized date: {raw}");
                    std::process::exit(1);
                }
            },
            None => repo.get_today(),
        }
    };
    // Highest Smart Score first.
    tasks.sort_by(|a, b| {
        b.smart_score
            .partial_cmp(&a.smart_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    print_table(&tasks);
}

pub fn cmd_view<B: StorageBackend>(repo: &mut Repository<B>, id: u64) {
    let tasks = repo.get_all();
    let Some(task) = tasks.iter().find(|t| t.id == id) else {
        bail(Error::NotFound(id));
    };
    println!("#{} {}", task.id, task.name);
    println!("  why:       {}", task.why);
    println!("  date:      {}", task.date);
    println!("  eta:       {}", format_eta_relative(task.eta, Utc::now()));
    println!("  time:      {}m", task.time_required);
    println!("  priority:  {}", task.priority);
    println!("  quadrant:  {}", task.eisenhower_matrix);
    println!("  score:     {:.1}", task.smart_score);
    println!(
        "  status:    {}",
        if task.completed { "done" } else { "open" }
    );
    if let Some(at) = task.completed_at {
        println!("  done at:   {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }
    if !task.comments.is_empty() {
        println!("  comments:");
        for c in &task.comments {
            println!(
                "    [{}] {}",
                c.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                c.text
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_update<B: StorageBackend>(
    repo: &mut Repository<B>,
    id: u64,
    name: Option<String>,
    why: Option<String>,
    eta: Option<String>,
    time: Option<i64>,
    priority: Option<i64>,
    quadrant: Option<Quadrant>,
    clear_eta: bool,
) {
    let mut patch = Map::new();
    if let Some(n) = name {
        patch.insert("name".to_string(), json!(n));
    }
    if let Some(w) = why {
        patch.insert("why".to_string(), json!(w));
    }
    if clear_eta {
        patch.insert("eta".to_string(), Value::Null);
    } else if let Some(raw) = eta {
        match parse_eta_input(&raw) {
            Some(dt) => {
                patch.insert("eta".to_string(), json!(dt));
            }
            None => {
                eprintln!("Unrecognized eta: {raw}");
                std::process::exit(1);
            }
        }
    }
    if let Some(t) = time {
        patch.insert("timeRequired".to_string(), json!(t));
    }
    if let Some(p) = priority {
        patch.insert("priority".to_string(), json!(p));
    }
    if let Some(q) = quadrant {
        patch.insert("eisenhowerMatrix".to_string(), json!(q.as_str()));
    }
    if patch.is_empty() {
        eprintln!("Nothing to update.");
        std::process::exit(1);
    }

    match repo.update(id, &Value::Object(patch)) {
        Ok(task) => println!("Updated task {} (score {:.1})", task.id, task.smart_score),
        Err(e) => bail(e),
    }
}

pub fn cmd_done<B: StorageBackend>(repo: &mut Repository<B>, id: u64, completed: bool) {
    match repo.update(id, &json!({"completed": completed})) {
        Ok(task) => {
            if completed {
                println!("Completed task {}", task.id);
            } else {
                println!("Reopened task {}", task.id);
            }
        }
        Err(e) => bail(e),
    }
}

pub fn cmd_delete<B: StorageBackend>(repo: &mut Repository<B>, id: u64) {
    match repo.delete(id) {
        Ok(()) => println!("Deleted task {id}"),
        Err(e) => bail(e),
    }
}

pub fn cmd_comment<B: StorageBackend>(repo: &mut Repository<B>, id: u64, text: String) {
    match repo.add_comment(id, &text) {
        Ok(_) => println!("Comment added to task {id}"),
        Err(e) => bail(e),
    }
}

pub fn cmd_reorder<B: StorageBackend>(repo: &mut Repository<B>, ids: Vec<u64>) {
    if ids.is_empty() {
        eprintln!("Provide at least one task id.");
        std::process::exit(1);
    }
    match repo.reorder(&ids) {
        Ok(tasks) => print_table(&tasks),
        Err(e) => bail(e),
    }
}

pub fn cmd_stats<B: StorageBackend>(repo: &mut Repository<B>, date: Option<String>) {
    let date = match date {
        Some(raw) => match parse_date_input(&raw) {
            Some(d) => Some(d),
            None => {
                eprintln!("Unrecognized date: {raw}");
                std::process::exit(1);
            }
        },
        None => None,
    };
    let stats = repo.stats(date);
    println!("Total:      {}", stats.total);
    println!("Completed:  {}", stats.completed);
    println!("Pending:    {}", stats.pending);
    println!("Overdue:    {}", stats.overdue);
    println!(
        "Quadrants:  Q1 {} | Q2 {} | Q3 {} | Q4 {}",
        stats.q1, stats.q2, stats.q3, stats.q4
    );
    println!(
        "Time:       {}m planned, {}m completed",
        stats.time_total, stats.time_completed
    );
    println!("Avg score:  {:.1}", stats.avg_smart_score);
}

pub fn cmd_search<B: StorageBackend>(
    repo: &mut Repository<B>,
    query: String,
    from: Option<String>,
    to: Option<String>,
) {
    let range = match (from, to) {
        (None, None) => None,
        (from, to) => {
            let parse = |raw: Option<String>, fallback: NaiveDate| match raw {
                Some(s) => parse_date_input(&s).unwrap_or_else(|| {
                    eprintln!("Unrecognized date: {s}");
                    std::process::exit(1);
                }),
                None => fallback,
            };
            let from = parse(from, NaiveDate::MIN);
            let to = parse(to, NaiveDate::MAX);
            Some((from, to))
        }
    };
    let hits = repo.search(&query, range);
    if hits.is_empty() {
        println!("No matches.");
    } else {
        print_table(&hits);
    }
}

pub fn cmd_export<B: StorageBackend>(repo: &mut Repository<B>, output: Option<PathBuf>) {
    let path = output.unwrap_or_else(|| PathBuf::from("dayplan_export.json"));
    let snapshot = repo.export_snapshot();
    match fs::write(&path, snapshot) {
        Ok(()) => println!("Exported to {}", path.display()),
        Err(e) => {
            eprintln!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

pub fn cmd_import<B: StorageBackend>(repo: &mut Repository<B>, input: PathBuf) {
    let payload = match fs::read_to_string(&input) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };
    match repo.import_snapshot(&payload) {
        Ok(count) => println!("Imported {count} task(s)"),
        Err(e) => bail(e),
    }
}

pub fn cmd_restore_backup<B: StorageBackend>(repo: &mut Repository<B>) {
    match repo.store_mut().restore_from_backup() {
        Ok(collection) => println!("Restored {} task(s) from backup", collection.tasks.len()),
        Err(e) => bail(e),
    }
}

pub fn cmd_clear<B: StorageBackend>(repo: &mut Repository<B>, force: bool) {
    if !force {
        print!("This deletes all tasks (one backup snapshot is kept). Continue? (y/N): ");
        let _ = io::stdout().flush();
        let mut response = String::new();
        if io::stdin().read_line(&mut response).is_err()
            || !response.trim().to_lowercase().starts_with('y')
        {
            println!("Cancelled.");
            return;
        }
    }
    repo.store_mut().clear_all();
    println!("All tasks cleared.");
}

pub fn cmd_settings<B: StorageBackend>(repo: &mut Repository<B>, action: SettingsAction) {
    let store = repo.store_mut();
    match action {
        SettingsAction::Show => {
            let s = store.settings();
            println!("theme:         {}", s.theme);
            println!("auto_theme:    {}", s.auto_theme);
            println!("notifications: {}", s.notifications);
            println!("sound_effects: {}", s.sound_effects);
        }
        SettingsAction::Set {
            theme,
            auto_theme,
            notifications,
            sound_effects,
        } => {
            let mut s = store.settings();
            if let Some(t) = theme {
                s.theme = t;
            }
            if let Some(v) = auto_theme {
                s.auto_theme = v;
            }
            if let Some(v) = notifications {
                s.notifications = v;
            }
            if let Some(v) = sound_effects {
                s.sound_effects = v;
            }
            if store.save_settings(&s) {
                println!("Settings saved.");
            } else {
                eprintln!("Failed to save settings.");
                std::process::exit(1);
            }
        }
    }
}

pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Parse human-friendly day input: "today", "tomorrow", "yesterday", or
/// YYYY-MM-DD.
pub fn parse_date_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Utc::now().date_naive();
    match s.as_str() {
        "today" => Some(today),
        "tomorrow" => Some(today + Duration::days(1)),
        "yesterday" => Some(today - Duration::days(1)),
        _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok(),
    }
}

/// Parse a deadline. Accepts RFC 3339, "YYYY-MM-DD HH:MM" (UTC),
/// "YYYY-MM-DD" / "today" / "tomorrow" (end of day), and "in Nd".
pub fn parse_eta_input(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("in ") {
        if let Some(days) = rest
            .strip_suffix('d')
            .and_then(|n| n.trim().parse::<i64>().ok())
        {
            return Some(Utc::now() + Duration::days(days));
        }
    }
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 0)?;
    parse_date_input(trimmed).map(|d| d.and_time(end_of_day).and_utc())
}

/// Format an ETA relative to now ("today 17:00", "in 3d", "2d late").
pub fn format_eta_relative(eta: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match eta {
        None => "-".into(),
        Some(eta) => {
            let days = (eta.date_naive() - now.date_naive()).num_days();
            let time = eta.with_timezone(&Local).format("%H:%M");
            if days == 0 {
                format!("today {time}")
            } else if days == 1 {
                format!("tomorrow {time}")
            } else if days > 1 {
                format!("in {days}d")
            } else if days == -1 {
                "yesterday".into()
            } else {
                format!("{}d late", -days)
            }
        }
    }
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    println!(
        "{:<5} {:<6} {:<4} {:<3} {:<12} {:<6} {:<5} {}",
        "ID", "Score", "Pri", "Q", "ETA", "Time", "Done", "Name"
    );
    let now = Utc::now();
    for t in tasks {
        println!(
            "{:<5} {:<6.1} {:<4} {:<3} {:<12} {:<6} {:<5} {}",
            t.id,
            t.smart_score,
            t.priority,
            truncate(&t.eisenhower_matrix, 3),
            format_eta_relative(t.eta, now),
            format!("{}m", t.time_required),
            if t.completed { "yes" } else { "no" },
            truncate(&t.name, 48),
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
