//! Error taxonomy for repository operations.
//!
//! Storage-level failures never surface here on the read path: the store
//! funnels them through its recovery path and always hands back a usable
//! collection. Write failures surface as `Persist`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation (missing required field, malformed patch).
    #[error("{0}")]
    Validation(String),

    /// No task with the given id exists.
    #[error("task {0} not found")]
    NotFound(u64),

    /// Comment text was empty after trimming.
    #[error("comment text cannot be empty")]
    EmptyComment,

    /// The backup slot is empty; nothing to restore.
    #[error("no backup available")]
    NoBackup,

    /// The store reported a write failure; the in-memory mutation was not
    /// persisted.
    #[error("failed to persist tasks")]
    Persist,

    /// Import payload does not expose a `tasks` array.
    #[error("invalid import format: missing tasks array")]
    InvalidFormat,
}
