//! Record and user storage backends.
//!
//! Records are partitioned by the owning user's login; nothing one user
//! stores is ever visible through another user's partition.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use passkeep_core::Record;
use thiserror::Error;

pub use memory::{MemoryRecordStore, MemoryUserStore};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Login {0:?} is already taken")]
    LoginTaken(String),

    #[error("User {0:?} not found")]
    UserNotFound(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Outcome of merging one batch into a partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records inserted or replaced.
    pub accepted: u64,
    /// Records skipped because the stored copy is as new or newer.
    pub stale: u64,
}

/// Per-user record storage with last-write-wins merge.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Merge `records` into `login`'s partition.
    ///
    /// Each record is inserted when its id is new and replaces the stored copy
    /// only when its `last_update_date` is strictly later. Concurrent calls for
    /// the same login are serialized.
    async fn add_records(&self, login: &str, records: Vec<Record>)
        -> Result<MergeSummary, StoreError>;

    /// Every record in `login`'s partition, in no particular order.
    async fn all_records(&self, login: &str) -> Result<Vec<Record>, StoreError>;
}

pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}
