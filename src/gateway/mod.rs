//! Submission gateway
//!
//! Validates a bulk URL submission and turns it into one queued task per URL.
//! Validation happens before anything is enqueued, so a rejected submission
//! never leaves partial work behind.

use crate::queue::{QueueError, TaskQueue};
use std::sync::Arc;
use thiserror::Error;

/// Reasons a submission is refused
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("No URLs provided")]
    Empty,

    #[error("Too many URLs: {len} submitted, at most {max} allowed")]
    TooLarge { len: usize, max: usize },

    #[error("Failed to queue tasks: {0}")]
    Queue(#[from] QueueError),
}

impl SubmissionError {
    /// Returns true if the caller sent a bad request, as opposed to the queue
    /// failing
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Empty | Self::TooLarge { .. })
    }
}

/// Accepts URL batches and enqueues them
#[derive(Clone)]
pub struct SubmissionGateway {
    queue: Arc<dyn TaskQueue>,
    max_batch_size: usize,
}

impl SubmissionGateway {
    pub fn new(queue: Arc<dyn TaskQueue>, max_batch_size: usize) -> Self {
        Self {
            queue,
            max_batch_size,
        }
    }

    /// Enqueues one task per URL
    ///
    /// URLs are not checked for well-formedness here; a bad URL becomes a
    /// task that fails with a `malformed_url` record.
    ///
    /// # Returns
    ///
    /// * `Ok(count)` - Every URL was queued
    /// * `Err(SubmissionError)` - Nothing was queued
    pub async fn submit(&self, urls: &[String]) -> Result<usize, SubmissionError> {
        if urls.is_empty() {
            return Err(SubmissionError::Empty);
        }

        if urls.len() > self.max_batch_size {
            return Err(SubmissionError::TooLarge {
                len: urls.len(),
                max: self.max_batch_size,
            });
        }

        let accepted = self.queue.enqueue_batch(urls).await?;
        tracing::info!("Queued {} tasks", accepted);

        Ok(accepted)
    }
}
