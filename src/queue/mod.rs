//! Task queue for page fetch tasks
//!
//! This module defines the queue contract the worker pool consumes:
//! - Batch enqueue of one task per submitted URL
//! - Blocking dequeue that hands out a leased delivery
//! - Acknowledgment after the task's outcome has been persisted
//!
//! Delivery is at-least-once. A delivery that is never acknowledged becomes
//! claimable again once its lease expires.

mod sqlite;

pub use sqlite::SqliteQueue;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Queue connection lock poisoned")]
    LockPoisoned,

    #[error("Blocking queue task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// One unit of work: a single URL to fetch and extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub url: String,
}

/// A task handed to a worker, identified for acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue-assigned task ID
    pub id: i64,

    pub task: Task,

    /// How many times this task has been delivered, starting at 1
    pub attempt: u32,
}

/// Snapshot of how many tasks are waiting and in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub pending: u64,
    pub leased: u64,
}

/// Trait for queue transports
///
/// Implementations must be safe to call from every worker lane at once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueues one task per URL, all or nothing
    ///
    /// # Returns
    ///
    /// The number of tasks accepted
    async fn enqueue_batch(&self, urls: &[String]) -> QueueResult<usize>;

    /// Waits until a task is available and leases it to the caller
    async fn dequeue(&self) -> QueueResult<Delivery>;

    /// Leases a task if one is available right now
    async fn try_dequeue(&self) -> QueueResult<Option<Delivery>>;

    /// Removes a processed task from the queue
    ///
    /// Acknowledging a task that is already gone is not an error.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Counts pending and leased tasks
    async fn depth(&self) -> QueueResult<QueueDepth>;
}
