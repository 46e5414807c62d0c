//! Task repository: the CRUD/search/import-export surface the presentation
//! layer calls into.
//!
//! Every mutating operation is load → mutate in memory → validate → persist
//! the whole collection. There is no partial write; a failed save surfaces as
//! `Error::Persist` and the in-memory mutation is discarded.

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::score;
use crate::store::{Collection, StorageBackend, Store};
use crate::task::{stamp_derived, validate_task, Comment, Task};

const EXPORT_VERSION: &str = "1.0";

/// Aggregate counts over a set of tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Overdue and not completed, recomputed against the current clock.
    pub overdue: usize,
    pub q1: usize,
    pub q2: usize,
    pub q3: usize,
    pub q4: usize,
    /// Sum of `time_required` over all tasks, in minutes.
    pub time_total: i64,
    /// Sum of `time_required` over completed tasks, in minutes.
    pub time_completed: i64,
    /// Mean Smart Score, 0.0 when there are no tasks.
    pub avg_smart_score: f64,
}

pub struct Repository<B: StorageBackend> {
    store: Store<B>,
}

impl<B: StorageBackend> Repository<B> {
    pub fn new(store: Store<B>) -> Self {
        Repository { store }
    }

    /// Direct store access for the operations that bypass the task surface
    /// (settings, backup restore, clear).
    pub fn store_mut(&mut self) -> &mut Store<B> {
        &mut self.store
    }

    /// Create a task from raw input. The id, `completed=false`, and today's
    /// date are forced regardless of what the input claims.
    pub fn add(&mut self, input: &Value) -> Result<Task> {
        let mut obj = input
            .as_object()
            .cloned()
            .ok_or_else(|| Error::Validation("task input must be an object".to_string()))?;

        let mut collection = self.store.load();
        let now = Utc::now();

        obj.insert("id".to_string(), json!(collection.next_id));
        obj.insert("completed".to_string(), json!(false));
        obj.insert(
            "date".to_string(),
            json!(now.date_naive().format("%Y-%m-%d").to_string()),
        );

        let task = validate_task(&Value::Object(obj), now)
            .ok_or_else(|| Error::Validation("invalid task data".to_string()))?;
        if task.name.is_empty() || task.why.is_empty() {
            return Err(Error::Validation(
                "missing required field: name and why are required".to_string(),
            ));
        }

        collection.tasks.push(task.clone());
        collection.next_id += 1;
        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(task)
    }

    /// Merge a patch over an existing task and re-validate the result. The id
    /// is pinned; `completed_at` is stamped only on the false→true transition
    /// of `completed`.
    pub fn update(&mut self, id: u64, patch: &Value) -> Result<Task> {
        let patch_obj = patch
            .as_object()
            .ok_or_else(|| Error::Validation("invalid data".to_string()))?;

        let mut collection = self.store.load();
        let now = Utc::now();
        let idx = collection
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::NotFound(id))?;

        let existing = &collection.tasks[idx];
        let was_completed = existing.completed;

        let mut merged = match existing.to_value() {
            Value::Object(m) => m,
            _ => return Err(Error::Validation("invalid data".to_string())),
        };
        for (key, value) in patch_obj {
            merged.insert(key.clone(), value.clone());
        }
        merged.insert("id".to_string(), json!(id));

        let mut task = validate_task(&Value::Object(merged), now)
            .ok_or_else(|| Error::Validation("invalid data".to_string()))?;
        task.updated_at = now;
        if task.completed && !was_completed {
            task.completed_at = Some(now);
        }

        collection.tasks[idx] = task.clone();
        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(task)
    }

    pub fn delete(&mut self, id: u64) -> Result<()> {
        let mut collection = self.store.load();
        let idx = collection
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::NotFound(id))?;
        collection.tasks.remove(idx);
        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(())
    }

    /// Append a comment with a fresh unique id and refresh `updated_at`.
    pub fn add_comment(&mut self, id: u64, text: &str) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyComment);
        }

        let mut collection = self.store.load();
        let now = Utc::now();
        let task = collection
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound(id))?;

        let mut comment_id = now.timestamp_millis() as u64;
        while task.comments.iter().any(|c| c.id == comment_id) {
            comment_id += 1;
        }
        let comment = Comment {
            id: comment_id,
            text: text.to_string(),
            timestamp: now,
        };
        task.comments.push(comment.clone());
        task.updated_at = now;

        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(comment)
    }

    /// Destructive re-prioritization: each listed task gets
    /// `priority = its 1-based position` and moves to the front in list
    /// order; unlisted tasks keep their priority and relative order after.
    pub fn reorder(&mut self, ordered_ids: &[u64]) -> Result<Vec<Task>> {
        let mut collection = self.store.load();
        let now = Utc::now();

        let mut reordered = Vec::with_capacity(ordered_ids.len());
        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(idx) = collection.tasks.iter().position(|t| t.id == *id) {
                let mut task = collection.tasks.remove(idx);
                task.priority = position as i64 + 1;
                task.updated_at = now;
                stamp_derived(&mut task, now);
                reordered.push(task);
            }
        }
        let untouched = std::mem::take(&mut collection.tasks);
        collection.tasks = reordered;
        collection.tasks.extend(untouched);

        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(collection.tasks)
    }

    pub fn get_all(&mut self) -> Vec<Task> {
        self.store.load().tasks
    }

    pub fn get_by_date(&mut self, date: NaiveDate) -> Vec<Task> {
        self.store
            .load()
            .tasks
            .into_iter()
            .filter(|t| t.date == date)
            .collect()
    }

    pub fn get_today(&mut self) -> Vec<Task> {
        self.get_by_date(Utc::now().date_naive())
    }

    /// Aggregate counts, optionally restricted to one owning day. Overdue and
    /// Smart Score figures are recomputed against the current clock rather
    /// than read from the stamped fields.
    pub fn stats(&mut self, date: Option<NaiveDate>) -> Stats {
        let now = Utc::now();
        let tasks: Vec<Task> = match date {
            Some(d) => self.get_by_date(d),
            None => self.get_all(),
        };

        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let overdue = tasks
            .iter()
            .filter(|t| score::is_overdue(t.eta, t.completed, now))
            .count();
        let quadrant_count =
            |q: &str| tasks.iter().filter(|t| t.eisenhower_matrix == q).count();
        let avg_smart_score = if total == 0 {
            0.0
        } else {
            tasks
                .iter()
                .map(|t| {
                    score::smart_score(
                        t.priority,
                        t.eta,
                        &t.eisenhower_matrix,
                        t.time_required,
                        now,
                    )
                })
                .sum::<f64>()
                / total as f64
        };

        Stats {
            total,
            completed,
            pending: total - completed,
            overdue,
            q1: quadrant_count("Q1"),
            q2: quadrant_count("Q2"),
            q3: quadrant_count("Q3"),
            q4: quadrant_count("Q4"),
            time_total: tasks.iter().map(|t| t.time_required).sum(),
            time_completed: tasks
                .iter()
                .filter(|t| t.completed)
                .map(|t| t.time_required)
                .sum(),
            avg_smart_score,
        }
    }

    /// Case-insensitive substring search over name, why, and comment texts.
    /// An empty query matches nothing, not everything.
    pub fn search(&mut self, query: &str, date_range: Option<(NaiveDate, NaiveDate)>) -> Vec<Task> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.store
            .load()
            .tasks
            .into_iter()
            .filter(|t| match date_range {
                Some((from, to)) => t.date >= from && t.date <= to,
                None => true,
            })
            .filter(|t| {
                t.name.to_lowercase().contains(&query)
                    || t.why.to_lowercase().contains(&query)
                    || t.comments
                        .iter()
                        .any(|c| c.text.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Serialize the full collection plus export metadata.
    pub fn export_snapshot(&mut self) -> String {
        let collection = self.store.load();
        let mut value = serde_json::to_value(&collection).unwrap_or_else(|_| json!({}));
        if let Some(obj) = value.as_object_mut() {
            obj.insert("exportedAt".to_string(), json!(Utc::now()));
            obj.insert("exportVersion".to_string(), json!(EXPORT_VERSION));
        }
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    /// Replace the collection with an imported snapshot. Accepts any record
    /// exposing a `tasks` array; everything else is re-derived. The current
    /// collection lands in the backup slot before being overwritten. Returns
    /// the number of tasks imported.
    pub fn import_snapshot(&mut self, payload: &str) -> Result<usize> {
        let value: Value = serde_json::from_str(payload).map_err(|_| Error::InvalidFormat)?;
        let raw_tasks = value
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or(Error::InvalidFormat)?;

        let now = Utc::now();
        let tasks: Vec<Task> = raw_tasks
            .iter()
            .filter_map(|t| validate_task(t, now))
            .collect();
        if tasks.len() < raw_tasks.len() {
            warn!(
                "import dropped {} invalid task(s)",
                raw_tasks.len() - tasks.len()
            );
        }

        let current = self.store.load();
        let mut collection = Collection {
            version: current.version,
            created_at: current.created_at,
            last_modified: now,
            next_id: tasks.iter().map(|t| t.id).max().map(|m| m + 1).unwrap_or(1),
            tasks,
        };
        // save() snapshots the outgoing collection into the backup slot.
        if !self.store.save(&mut collection) {
            return Err(Error::Persist);
        }
        Ok(collection.tasks.len())
    }
}
