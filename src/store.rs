//! Persistence for the task collection and settings.
//!
//! Three independent keyed blobs live in a pluggable key-value backend: the
//! collection, a single-generation backup of it, and the settings record.
//! Every overwrite of the collection first snapshots the prior bytes into the
//! backup slot, so one level of rollback is always available. Read-path
//! failures never reach the caller: they funnel through `recover`, which
//! degrades to the backup and finally to a fresh empty collection.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{validate_task, Task};

pub const COLLECTION_KEY: &str = "collection";
pub const BACKUP_KEY: &str = "collection_backup";
pub const SETTINGS_KEY: &str = "settings";

const SCHEMA_VERSION: &str = "1.0";

/// Durable key-value namespace the store writes its blobs into. Injected so
/// tests and embedders can substitute an in-memory implementation.
pub trait StorageBackend {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// One file per key under a data directory, written via temp file + rename.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        FileBackend {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// HashMap-backed store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// The full persisted task set plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub next_id: u64,
}

impl Collection {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Collection {
            version: SCHEMA_VERSION.to_string(),
            created_at: now,
            last_modified: now,
            tasks: Vec::new(),
            next_id: 1,
        }
    }
}

/// User preferences, stored independently of the task collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: String,
    pub auto_theme: bool,
    pub notifications: bool,
    pub sound_effects: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            theme: "auto".to_string(),
            auto_theme: true,
            notifications: true,
            sound_effects: false,
        }
    }
}

/// Store over the three blobs. All operations are synchronous read-modify-
/// write on the whole collection; there is no locking and no compare-and-swap,
/// so it is single-writer by construction.
pub struct Store<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Store { backend }
    }

    /// Create the default empty collection on first run, or migrate whatever
    /// is already persisted.
    pub fn initialize(&mut self) -> Collection {
        let now = Utc::now();
        match self.backend.read(COLLECTION_KEY) {
            None => {
                let mut collection = Collection::empty(now);
                self.save(&mut collection);
                collection
            }
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => self.migrate(&value, now),
                Err(e) => {
                    warn!("failed to parse persisted collection: {e}");
                    self.recover(now)
                }
            },
        }
    }

    /// Backfill top-level fields, re-validate every task (dropping any the
    /// validator rejects), recompute `next_id`, and persist.
    fn migrate(&mut self, raw: &Value, now: DateTime<Utc>) -> Collection {
        let version = raw
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(SCHEMA_VERSION)
            .to_string();
        let created_at = raw
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(now);

        let raw_tasks = raw
            .get("tasks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = raw_tasks.len();
        let tasks: Vec<Task> = raw_tasks
            .iter()
            .filter_map(|t| validate_task(t, now))
            .collect();
        if tasks.len() < total {
            warn!("migration dropped {} invalid task(s)", total - tasks.len());
        }

        let next_id = tasks.iter().map(|t| t.id).max().map(|m| m + 1).unwrap_or(1);

        let mut collection = Collection {
            version,
            created_at,
            last_modified: now,
            tasks,
            next_id,
        };
        self.save(&mut collection);
        collection
    }

    /// Read the persisted collection. Absent data initializes; unparseable
    /// data goes through recovery. Never fails the caller.
    pub fn load(&mut self) -> Collection {
        match self.backend.read(COLLECTION_KEY) {
            None => self.initialize(),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(collection) => collection,
                Err(e) => {
                    warn!("failed to parse persisted collection: {e}");
                    self.recover(Utc::now())
                }
            },
        }
    }

    /// Persist the collection, snapshotting the prior bytes to the backup
    /// slot first. Returns false on write failure instead of raising.
    pub fn save(&mut self, collection: &mut Collection) -> bool {
        if let Some(current) = self.backend.read(COLLECTION_KEY) {
            if let Err(e) = self.backend.write(BACKUP_KEY, &current) {
                warn!("failed to write backup: {e}");
            }
        }

        collection.last_modified = Utc::now();
        let payload = match serde_json::to_string_pretty(collection) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize collection: {e}");
                return false;
            }
        };
        match self.backend.write(COLLECTION_KEY, &payload) {
            Ok(()) => {
                debug!(tasks = collection.tasks.len(), "collection saved");
                true
            }
            Err(e) => {
                warn!("failed to persist collection: {e}");
                self.recover(Utc::now());
                false
            }
        }
    }

    /// Terminal fallback: the backup if it parses, otherwise a fresh empty
    /// collection. Never raises.
    fn recover(&mut self, now: DateTime<Utc>) -> Collection {
        if let Some(raw) = self.backend.read(BACKUP_KEY) {
            if let Ok(collection) = serde_json::from_str(&raw) {
                warn!("recovered collection from backup");
                return collection;
            }
            warn!("backup slot is unusable");
        }
        Collection::empty(now)
    }

    /// Explicitly roll back to the backup slot, migrating and persisting it
    /// as the current collection.
    pub fn restore_from_backup(&mut self) -> Result<Collection> {
        let raw = self.backend.read(BACKUP_KEY).ok_or(Error::NoBackup)?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|_| Error::Validation("backup is corrupted".to_string()))?;
        Ok(self.migrate(&value, Utc::now()))
    }

    /// Snapshot the current collection to the backup slot, delete it, and
    /// reinitialize empty.
    pub fn clear_all(&mut self) -> Collection {
        if let Some(current) = self.backend.read(COLLECTION_KEY) {
            if let Err(e) = self.backend.write(BACKUP_KEY, &current) {
                warn!("failed to snapshot before clear: {e}");
            }
        }
        if let Err(e) = self.backend.remove(COLLECTION_KEY) {
            warn!("failed to remove collection: {e}");
        }
        self.initialize()
    }

    /// Settings fall back to hardcoded defaults on any read or parse failure.
    pub fn settings(&self) -> Settings {
        self.backend
            .read(SETTINGS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save_settings(&mut self, settings: &Settings) -> bool {
        let payload = match serde_json::to_string_pretty(settings) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.backend.write(SETTINGS_KEY, &payload).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store() -> Store<MemoryBackend> {
        Store::new(MemoryBackend::new())
    }

    #[test]
    fn initialize_creates_empty_collection() {
        let mut store = memory_store();
        let collection = store.initialize();
        assert!(collection.tasks.is_empty());
        assert_eq!(collection.next_id, 1);
        // Persisted: a fresh load sees the same thing.
        assert!(store.load().tasks.is_empty());
    }

    #[test]
    fn migration_drops_invalid_tasks_and_recomputes_next_id() {
        let mut store = memory_store();
        let legacy = json!({
            "tasks": [
                {"id": 4, "name": "keep", "why": "valid"},
                "not a task",
                {"id": 9, "name": "also keep", "why": "valid"}
            ]
        });
        store
            .backend
            .write(COLLECTION_KEY, &legacy.to_string())
            .unwrap();

        let collection = store.initialize();
        assert_eq!(collection.tasks.len(), 2);
        assert_eq!(collection.next_id, 10);
        assert_eq!(collection.version, "1.0");
    }

    #[test]
    fn save_keeps_one_backup_generation() {
        let mut store = memory_store();
        let mut collection = store.initialize();
        let first_bytes = store.backend.read(COLLECTION_KEY).unwrap();

        collection.next_id = 42;
        assert!(store.save(&mut collection));
        assert_eq!(store.backend.read(BACKUP_KEY).unwrap(), first_bytes);

        // A second save overwrites the backup (last write wins).
        let second_bytes = store.backend.read(COLLECTION_KEY).unwrap();
        collection.next_id = 43;
        assert!(store.save(&mut collection));
        assert_eq!(store.backend.read(BACKUP_KEY).unwrap(), second_bytes);
    }

    #[test]
    fn load_recovers_from_backup_on_parse_failure() {
        let mut store = memory_store();
        let mut collection = store.initialize();
        collection.next_id = 7;
        store.save(&mut collection);
        // Second save pushes a parseable snapshot into the backup slot.
        store.save(&mut collection);

        store.backend.write(COLLECTION_KEY, "{corrupt").unwrap();
        let recovered = store.load();
        assert_eq!(recovered.next_id, 7);
    }

    #[test]
    fn recovery_degrades_to_empty_when_backup_is_unusable() {
        let mut store = memory_store();
        store.backend.write(COLLECTION_KEY, "{corrupt").unwrap();
        store.backend.write(BACKUP_KEY, "also corrupt").unwrap();
        let collection = store.load();
        assert!(collection.tasks.is_empty());
        assert_eq!(collection.next_id, 1);
    }

    #[test]
    fn restore_from_backup_requires_a_backup() {
        let mut store = memory_store();
        store.initialize();
        assert!(matches!(
            store.restore_from_backup(),
            Err(Error::NoBackup)
        ));
    }

    #[test]
    fn restore_from_backup_migrates_and_persists() {
        let mut store = memory_store();
        let backup = json!({"tasks": [{"id": 2, "name": "saved", "why": "backup"}]});
        store
            .backend
            .write(BACKUP_KEY, &backup.to_string())
            .unwrap();

        let restored = store.restore_from_backup().unwrap();
        assert_eq!(restored.tasks.len(), 1);
        assert_eq!(restored.next_id, 3);
        assert_eq!(store.load().tasks.len(), 1);
    }

    #[test]
    fn clear_all_snapshots_then_reinitializes() {
        let mut store = memory_store();
        let mut collection = store.initialize();
        collection.next_id = 99;
        store.save(&mut collection);
        let bytes_before_clear = store.backend.read(COLLECTION_KEY).unwrap();

        let fresh = store.clear_all();
        assert!(fresh.tasks.is_empty());
        assert_eq!(fresh.next_id, 1);
        assert_eq!(store.backend.read(BACKUP_KEY).unwrap(), bytes_before_clear);
    }

    #[test]
    fn settings_default_on_missing_or_garbage() {
        let mut store = memory_store();
        assert_eq!(store.settings(), Settings::default());
        assert_eq!(store.settings().theme, "auto");

        store.backend.write(SETTINGS_KEY, "not json").unwrap();
        assert_eq!(store.settings(), Settings::default());

        let custom = Settings {
            theme: "dark".to_string(),
            sound_effects: true,
            ..Settings::default()
        };
        assert!(store.save_settings(&custom));
        assert_eq!(store.settings(), custom);
    }

    #[test]
    fn file_backend_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::new(FileBackend::new(dir.path()));
        let mut collection = store.initialize();
        collection.next_id = 5;
        assert!(store.save(&mut collection));

        let mut reopened = Store::new(FileBackend::new(dir.path()));
        assert_eq!(reopened.load().next_id, 5);
    }
}
