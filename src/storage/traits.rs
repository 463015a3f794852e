//! Storage traits and error types
//!
//! This module defines the write boundary used by worker lanes and the read
//! boundary used by the API and statistics.

use crate::crawler::{FailureRecord, MediaRecord, MediaType};
use crate::state::OutcomeStatus;
use crate::storage::{MediaPage, MediaQuery, OutcomeRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,

    #[error("Blocking storage task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence boundary receiving task outcomes
///
/// Both writes may be invoked concurrently by every worker lane. A task that
/// is redelivered may write its outcome twice; implementations accept the
/// duplicate.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Records the media extracted from `source_url`
    ///
    /// An empty `records` slice is a successful outcome with no media.
    async fn write_media(&self, source_url: &str, records: &[MediaRecord]) -> StorageResult<()>;

    /// Records a failed task
    async fn write_failure(&self, record: &FailureRecord) -> StorageResult<()>;
}

/// Read access to stored results
pub trait MediaStore: Send + Sync {
    /// Lists media matching the query, newest first
    fn list_media(&self, query: &MediaQuery) -> StorageResult<MediaPage>;

    /// Counts stored media by type
    fn count_media_by_type(&self) -> StorageResult<HashMap<MediaType, u64>>;

    /// Counts recorded outcomes by status
    fn count_outcomes_by_status(&self) -> StorageResult<HashMap<OutcomeStatus, u64>>;

    /// Counts failed outcomes by failure kind
    fn failure_summary(&self) -> StorageResult<HashMap<String, u64>>;

    /// Gets the outcomes recorded for one source URL, oldest first
    fn outcomes_for(&self, source_url: &str) -> StorageResult<Vec<OutcomeRecord>>;
}
