//! Task record and the lenient validator that produces it.
//!
//! Callers hand the repository raw JSON (form input, imported files, legacy
//! persisted data); `validate_task` is the single place that coerces it into
//! a well-formed `Task`. Every malformed field falls back to a defaulting
//! rule; only input that isn't an object at all is rejected.
//! Derived fields (`overdue`, `urgent`, `important`, `smart_score`) are
//! restamped on every pass and are never trusted from the input.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::DEFAULT_QUADRANT;
use crate::score;

/// A single tracked task. Field names serialize in camelCase for
/// compatibility with previously exported snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub why: String,
    pub eta: Option<DateTime<Utc>>,
    pub time_required: i64,
    pub priority: i64,
    pub eisenhower_matrix: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
    /// The calendar day the task belongs to. Set at creation, never
    /// auto-updated afterwards.
    pub date: NaiveDate,
    // Derived fields, recomputed by the validator.
    pub overdue: bool,
    pub urgent: bool,
    pub important: bool,
    pub smart_score: f64,
}

/// An append-only comment on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Task {
    /// JSON representation, used as the merge base for update patches.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Normalize raw input into a `Task`. Returns `None` only when the input is
/// not a JSON object. Emptiness of `name`/`why` is allowed through here; the
/// repository enforces required fields.
pub fn validate_task(raw: &Value, now: DateTime<Utc>) -> Option<Task> {
    let obj = raw.as_object()?;

    let id = obj
        .get("id")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| now.timestamp_millis() as u64);

    let name = coerce_string(obj.get("name")).trim().to_string();
    let why = coerce_string(obj.get("why")).trim().to_string();

    let eta = obj.get("eta").and_then(parse_datetime);
    let time_required = coerce_int(obj.get("timeRequired")).unwrap_or(60).max(5);
    let priority = coerce_int(obj.get("priority")).unwrap_or(50).clamp(1, 100);

    let eisenhower_matrix = match obj.get("eisenhowerMatrix").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_QUADRANT.to_string(),
    };

    let completed = truthy(obj.get("completed"));
    let completed_at = obj.get("completedAt").and_then(parse_datetime);
    let created_at = obj.get("createdAt").and_then(parse_datetime).unwrap_or(now);
    let updated_at = obj.get("updatedAt").and_then(parse_datetime).unwrap_or(now);

    let comments = coerce_comments(obj.get("comments"), now);

    let date = obj
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| now.date_naive());

    let mut task = Task {
        id,
        name,
        why,
        eta,
        time_required,
        priority,
        eisenhower_matrix,
        completed,
        completed_at,
        created_at,
        updated_at,
        comments,
        date,
        overdue: false,
        urgent: false,
        important: false,
        smart_score: 0.0,
    };
    stamp_derived(&mut task, now);
    Some(task)
}

/// Recompute the derived fields against the given clock.
pub fn stamp_derived(task: &mut Task, now: DateTime<Utc>) {
    task.overdue = score::is_overdue(task.eta, task.completed, now);
    task.urgent = score::is_urgent(&task.eisenhower_matrix);
    task.important = score::is_important(&task.eisenhower_matrix);
    task.smart_score = score::smart_score(
        task.priority,
        task.eta,
        &task.eisenhower_matrix,
        task.time_required,
        now,
    );
}

fn coerce_string(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn coerce_int(v: Option<&Value>) -> Option<i64> {
    match v {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JavaScript-style truthiness, since persisted legacy data stored whatever
/// the form handed it.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// Accept RFC 3339 strings or epoch milliseconds.
fn parse_datetime(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| DateTime::from_timestamp_millis(ms)),
        _ => None,
    }
}

/// A comments array is kept element by element; a single non-empty scalar is
/// wrapped into a one-element list; anything else becomes empty.
fn coerce_comments(v: Option<&Value>, now: DateTime<Utc>) -> Vec<Comment> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce_comment(item, i as u64, now))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![Comment {
            id: now.timestamp_millis() as u64,
            text: s.clone(),
            timestamp: now,
        }],
        Some(Value::Number(n)) => vec![Comment {
            id: now.timestamp_millis() as u64,
            text: n.to_string(),
            timestamp: now,
        }],
        _ => Vec::new(),
    }
}

fn coerce_comment(v: &Value, index: u64, now: DateTime<Utc>) -> Comment {
    match v.as_object() {
        Some(obj) => Comment {
            id: obj
                .get("id")
                .and_then(Value::as_u64)
                .unwrap_or(now.timestamp_millis() as u64 + index),
            text: coerce_string(obj.get("text")),
            timestamp: obj
                .get("timestamp")
                .and_then(parse_datetime)
                .unwrap_or(now),
        },
        None => Comment {
            id: now.timestamp_millis() as u64 + index,
            text: coerce_string(Some(v)),
            timestamp: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn rejects_non_object_input() {
        let n = now();
        assert!(validate_task(&json!(null), n).is_none());
        assert!(validate_task(&json!("task"), n).is_none());
        assert!(validate_task(&json!([1, 2]), n).is_none());
    }

    #[test]
    fn applies_defaults() {
        let task = validate_task(&json!({}), now()).unwrap();
        assert_eq!(task.name, "");
        assert_eq!(task.why, "");
        assert_eq!(task.time_required, 60);
        assert_eq!(task.priority, 50);
        assert_eq!(task.eisenhower_matrix, "Q2");
        assert!(!task.completed);
        assert!(task.eta.is_none());
        assert!(task.completed_at.is_none());
        assert_eq!(task.created_at, now());
        assert_eq!(task.date, now().date_naive());
        assert!(task.comments.is_empty());
    }

    #[test]
    fn clamps_and_parses_numeric_fields() {
        let n = now();
        let task = validate_task(
            &json!({"timeRequired": "2", "priority": 500}),
            n,
        )
        .unwrap();
        assert_eq!(task.time_required, 5);
        assert_eq!(task.priority, 100);

        let task = validate_task(&json!({"timeRequired": "lots", "priority": -3}), n).unwrap();
        assert_eq!(task.time_required, 60);
        assert_eq!(task.priority, 1);
    }

    #[test]
    fn trims_name_and_why() {
        let task = validate_task(&json!({"name": "  ship it  ", "why": "\tdeadline\n"}), now())
            .unwrap();
        assert_eq!(task.name, "ship it");
        assert_eq!(task.why, "deadline");
    }

    #[test]
    fn wraps_scalar_comment() {
        let task = validate_task(&json!({"comments": "first note"}), now()).unwrap();
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.comments[0].text, "first note");

        let task = validate_task(&json!({"comments": ""}), now()).unwrap();
        assert!(task.comments.is_empty());
    }

    #[test]
    fn keeps_comment_array() {
        let task = validate_task(
            &json!({"comments": [
                {"id": 7, "text": "a", "timestamp": "2026-07-01T00:00:00Z"},
                {"id": 8, "text": "b", "timestamp": "2026-07-02T00:00:00Z"}
            ]}),
            now(),
        )
        .unwrap();
        assert_eq!(task.comments.len(), 2);
        assert_eq!(task.comments[0].id, 7);
        assert_eq!(task.comments[1].text, "b");
    }

    #[test]
    fn accepts_unknown_quadrant_verbatim() {
        let task = validate_task(&json!({"eisenhowerMatrix": "Q9"}), now()).unwrap();
        assert_eq!(task.eisenhower_matrix, "Q9");
        assert!(!task.urgent);
        assert!(!task.important);
    }

    #[test]
    fn validation_is_idempotent_under_a_fixed_clock() {
        let n = now();
        let first = validate_task(
            &json!({
                "id": 3,
                "name": "write report",
                "why": "quarterly review",
                "eta": "2026-08-03T09:00:00Z",
                "timeRequired": 90,
                "priority": 70,
                "eisenhowerMatrix": "Q1",
                "comments": [{"id": 1, "text": "draft done", "timestamp": "2026-07-30T10:00:00Z"}],
                "date": "2026-08-01"
            }),
            n,
        )
        .unwrap();
        let second = validate_task(&first.to_value(), n).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, first.name);
        assert_eq!(second.eta, first.eta);
        assert_eq!(second.date, first.date);
        assert_eq!(second.overdue, first.overdue);
        assert_eq!(second.urgent, first.urgent);
        assert_eq!(second.important, first.important);
        assert_eq!(second.smart_score, first.smart_score);
        assert_eq!(second.comments.len(), first.comments.len());
    }

    #[test]
    fn derived_fields_are_never_trusted_from_input() {
        let task = validate_task(
            &json!({"priority": 1, "overdue": true, "urgent": true, "smartScore": 99.9}),
            now(),
        )
        .unwrap();
        assert!(!task.overdue);
        assert!(!task.urgent);
        assert!(task.smart_score < 40.0);
    }
}
