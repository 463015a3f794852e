//! Statistics over the queue and stored results
//!
//! This module provides functionality for collecting and displaying
//! sweep statistics from the task queue and the result store.

use crate::crawler::MediaType;
use crate::queue::{QueueDepth, TaskQueue};
use crate::state::OutcomeStatus;
use crate::storage::{MediaStore, StorageError};
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Sweep statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepStatistics {
    /// Tasks waiting and in flight
    pub queue: QueueDepth,

    /// Pages fetched with their media recorded
    pub pages_succeeded: u64,

    /// Pages whose fetch failed
    pub pages_failed: u64,

    pub images: u64,

    pub videos: u64,

    /// Failed pages by failure kind
    pub failures_by_kind: HashMap<String, u64>,
}

impl SweepStatistics {
    /// Pages with a recorded outcome
    pub fn pages_processed(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }

    pub fn total_media(&self) -> u64 {
        self.images + self.videos
    }
}

/// Loads statistics from the result store and the queue
///
/// The store is read on the blocking thread pool.
///
/// # Arguments
///
/// * `store` - The result store to query
/// * `queue` - The task queue to measure
///
/// # Returns
///
/// * `Ok(SweepStatistics)` - Successfully loaded statistics
/// * `Err(SweepError)` - Failed to query the store or the queue
pub async fn load_statistics(
    store: Arc<dyn MediaStore>,
    queue: &dyn TaskQueue,
) -> Result<SweepStatistics> {
    let queue_depth = queue.depth().await?;

    let (outcomes, media, failures_by_kind) = tokio::task::spawn_blocking(move || {
        Ok::<_, StorageError>((
            store.count_outcomes_by_status()?,
            store.count_media_by_type()?,
            store.failure_summary()?,
        ))
    })
    .await
    .map_err(StorageError::from)??;

    Ok(SweepStatistics {
        queue: queue_depth,
        pages_succeeded: outcomes.get(&OutcomeStatus::Succeeded).copied().unwrap_or(0),
        pages_failed: outcomes.get(&OutcomeStatus::Failed).copied().unwrap_or(0),
        images: media.get(&MediaType::Image).copied().unwrap_or(0),
        videos: media.get(&MediaType::Video).copied().unwrap_or(0),
        failures_by_kind,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SweepStatistics) {
    println!("=== Sweep Statistics ===\n");

    println!("Queue:");
    println!("  Pending tasks: {}", stats.queue.pending);
    println!("  In-flight tasks: {}", stats.queue.leased);
    println!();

    println!("Pages:");
    println!("  Processed: {}", stats.pages_processed());
    println!("  Succeeded: {}", stats.pages_succeeded);
    println!("  Failed: {}", stats.pages_failed);
    println!();

    println!("Media:");
    println!("  Images: {}", stats.images);
    println!("  Videos: {}", stats.videos);
    println!("  Total: {}", stats.total_media());
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failure Summary:");
        // Sort kinds by count (descending)
        let mut failure_counts: Vec<_> = stats.failures_by_kind.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let processed = stats.pages_processed();
    let success_rate = if processed > 0 {
        (stats.pages_succeeded as f64 / processed as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        success_rate, stats.pages_succeeded, processed
    );
}
