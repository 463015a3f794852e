//! Media-Sweep: bulk media reference harvester
//!
//! This crate accepts large batches of page URLs, queues one durable task per
//! URL, and drains the queue with a fixed-size pool of worker lanes. Each lane
//! fetches a page once, extracts the image and video references it embeds, and
//! records either the extracted media or the failure reason.

pub mod api;
pub mod config;
pub mod crawler;
pub mod gateway;
pub mod output;
pub mod queue;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Media-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Media-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{extract_media, FailureRecord, MediaRecord, MediaType};
pub use gateway::SubmissionGateway;
pub use queue::{Delivery, SqliteQueue, Task, TaskQueue};
pub use state::{OutcomeStatus, TaskOutcome};
pub use storage::{ResultSink, SqliteStorage};
