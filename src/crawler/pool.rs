//! Worker pool - bounded-concurrency task processing
//!
//! This module drains the task queue with a fixed number of lanes. Each lane
//! handles one task at a time:
//! - Dequeue a task
//! - Fetch the page once
//! - Extract media on success
//! - Write media (or one failure record) to the result sink
//! - Acknowledge the task, only after the write succeeded
//!
//! The lane count is the only concurrency control, so at most `concurrency`
//! fetches are ever in flight.

use crate::config::WorkerConfig;
use crate::crawler::extractor::extract_media;
use crate::crawler::fetcher::{FailureRecord, FetchClient};
use crate::queue::{Delivery, TaskQueue};
use crate::state::TaskOutcome;
use crate::storage::ResultSink;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How long a lane waits after a queue transport error before trying again
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Completed-task interval between progress log lines
const PROGRESS_INTERVAL: u64 = 50;

/// Running counters shared by all lanes
#[derive(Debug, Default)]
pub struct PoolStats {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    media_found: AtomicU64,
    persistence_errors: AtomicU64,
}

/// Point-in-time copy of the pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Deliveries whose outcome was persisted and acknowledged
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub media_found: u64,
    /// Deliveries left unacknowledged because the sink write failed
    pub persistence_errors: u64,
}

impl PoolStats {
    fn record(&self, outcome: &TaskOutcome) -> u64 {
        match outcome {
            TaskOutcome::Succeeded { media_count } => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.media_found
                    .fetch_add(*media_count as u64, Ordering::Relaxed);
            }
            TaskOutcome::Failed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Unacknowledged => {
                self.persistence_errors.fetch_add(1, Ordering::Relaxed);
                return self.processed.load(Ordering::Relaxed);
            }
        }
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            media_found: self.media_found.load(Ordering::Relaxed),
            persistence_errors: self.persistence_errors.load(Ordering::Relaxed),
        }
    }
}

/// Everything a lane needs, shared between lanes
struct LaneContext {
    queue: Arc<dyn TaskQueue>,
    sink: Arc<dyn ResultSink>,
    fetcher: Arc<dyn FetchClient>,
    stats: Arc<PoolStats>,
}

/// Fixed-size pool of worker lanes
///
/// The queue, sink, and fetch client are injected, so the pool can run
/// against in-memory storage and scripted fetchers in tests.
pub struct WorkerPool {
    concurrency: usize,
    context: Arc<LaneContext>,
}

impl WorkerPool {
    /// Creates a new pool
    ///
    /// # Arguments
    ///
    /// * `config` - Worker configuration (lane count)
    /// * `queue` - Where tasks come from
    /// * `sink` - Where outcomes go
    /// * `fetcher` - How pages are fetched
    pub fn new(
        config: &WorkerConfig,
        queue: Arc<dyn TaskQueue>,
        sink: Arc<dyn ResultSink>,
        fetcher: Arc<dyn FetchClient>,
    ) -> Self {
        Self {
            concurrency: config.concurrency.max(1) as usize,
            context: Arc::new(LaneContext {
                queue,
                sink,
                fetcher,
                stats: Arc::new(PoolStats::default()),
            }),
        }
    }

    /// Starts all lanes on the current tokio runtime
    pub fn spawn(self) -> PoolHandle {
        let cancel = CancellationToken::new();
        let mut lanes = JoinSet::new();

        for lane in 0..self.concurrency {
            lanes.spawn(run_lane(lane, self.context.clone(), cancel.clone()));
        }

        tracing::info!("Worker pool started with {} lanes", self.concurrency);

        PoolHandle {
            cancel,
            lanes,
            stats: self.context.stats.clone(),
        }
    }

    /// Processes a single delivery on the calling task
    pub async fn process(&self, delivery: Delivery) -> TaskOutcome {
        let outcome = process_delivery(&self.context, delivery).await;
        self.context.stats.record(&outcome);
        outcome
    }

    pub fn stats(&self) -> PoolSnapshot {
        self.context.stats.snapshot()
    }
}

/// Handle to a running pool
pub struct PoolHandle {
    cancel: CancellationToken,
    lanes: JoinSet<()>,
    stats: Arc<PoolStats>,
}

impl PoolHandle {
    pub fn stats(&self) -> PoolSnapshot {
        self.stats.snapshot()
    }

    /// Stops the pool and waits for every lane to exit
    ///
    /// Lanes waiting on the queue stop immediately; a lane in the middle of a
    /// task finishes that task first.
    pub async fn shutdown(mut self) -> PoolSnapshot {
        self.cancel.cancel();

        while let Some(result) = self.lanes.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker lane ended abnormally: {}", e);
            }
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "Worker pool stopped: {} processed ({} succeeded, {} failed), {} media found",
            snapshot.processed,
            snapshot.succeeded,
            snapshot.failed,
            snapshot.media_found
        );
        snapshot
    }
}

/// Main loop of one lane
async fn run_lane(lane: usize, context: Arc<LaneContext>, cancel: CancellationToken) {
    tracing::debug!("Lane {} started", lane);

    loop {
        let dequeued = tokio::select! {
            _ = cancel.cancelled() => break,
            result = context.queue.dequeue() => result,
        };

        let delivery = match dequeued {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!("Lane {} failed to dequeue: {}", lane, e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => continue,
                }
            }
        };

        let outcome = process_delivery(&context, delivery).await;
        let completed = context.stats.record(&outcome);

        if outcome.status().is_some() && completed % PROGRESS_INTERVAL == 0 {
            let snapshot = context.stats.snapshot();
            tracing::info!(
                "Progress: {} tasks processed ({} succeeded, {} failed), {} media found",
                snapshot.processed,
                snapshot.succeeded,
                snapshot.failed,
                snapshot.media_found
            );
        }
    }

    tracing::debug!("Lane {} stopped", lane);
}

/// Runs one delivery through fetch, extract, persist, acknowledge
async fn process_delivery(context: &LaneContext, delivery: Delivery) -> TaskOutcome {
    let url = delivery.task.url.as_str();
    tracing::debug!("Processing {} (attempt {})", url, delivery.attempt);

    let (written, outcome) = match context.fetcher.fetch(url).await {
        Ok(document) => {
            let records = extract_media(url, &document.url, &document.body);
            let media_count = records.len();
            tracing::debug!("Extracted {} media references from {}", media_count, url);

            (
                context.sink.write_media(url, &records).await,
                TaskOutcome::Succeeded { media_count },
            )
        }
        Err(e) => {
            tracing::warn!("Fetch failed for {}: {}", url, e);
            let record = FailureRecord::from_fetch_error(url, &e);

            (
                context.sink.write_failure(&record).await,
                TaskOutcome::Failed { kind: e.kind() },
            )
        }
    };

    if let Err(e) = written {
        // Leave the lease to expire so the queue hands the task out again
        tracing::error!(
            "Failed to persist outcome for {} (task {}): {}",
            url,
            delivery.id,
            e
        );
        return TaskOutcome::Unacknowledged;
    }

    if let Err(e) = context.queue.ack(&delivery).await {
        // The outcome is stored; a redelivery only produces a duplicate
        tracing::warn!("Failed to acknowledge task {} ({}): {}", delivery.id, url, e);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{parse_fetch_url, Document, FetchError};
    use crate::crawler::MediaRecord;
    use crate::queue::SqliteQueue;
    use crate::state::OutcomeStatus;
    use crate::storage::{MediaQuery, MediaStore, SqliteStorage, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    /// Serves a fixed body for every URL, except URLs containing "fail"
    struct ScriptedFetcher {
        body: String,
    }

    #[async_trait]
    impl FetchClient for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            if url.contains("fail") {
                return Err(FetchError::Timeout);
            }
            let parsed = parse_fetch_url(url)?;
            Ok(Document {
                url: parsed.clone(),
                final_url: parsed,
                status_code: 200,
                body: self.body.clone(),
            })
        }
    }

    /// Sink whose writes fail until `healthy` is set
    struct FlakySink {
        inner: SqliteStorage,
        healthy: AtomicBool,
    }

    #[async_trait]
    impl ResultSink for FlakySink {
        async fn write_media(&self, source_url: &str, records: &[MediaRecord]) -> StorageResult<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(StorageError::LockPoisoned);
            }
            self.inner.write_media(source_url, records).await
        }

        async fn write_failure(&self, record: &FailureRecord) -> StorageResult<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(StorageError::LockPoisoned);
            }
            self.inner.write_failure(record).await
        }
    }

    /// Records the highest number of fetches in flight at once
    #[derive(Default)]
    struct GaugedFetcher {
        in_flight: AtomicU64,
        peak: AtomicU64,
    }

    #[async_trait]
    impl FetchClient for GaugedFetcher {
        async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let parsed = parse_fetch_url(url)?;
            Ok(Document {
                url: parsed.clone(),
                final_url: parsed,
                status_code: 200,
                body: String::new(),
            })
        }
    }

    fn worker_config(concurrency: u32) -> WorkerConfig {
        WorkerConfig {
            concurrency,
            fetch_timeout_secs: 5,
        }
    }

    fn test_queue(lease: Duration) -> Arc<SqliteQueue> {
        Arc::new(SqliteQueue::open_in_memory(lease, Duration::from_millis(10)).unwrap())
    }

    #[tokio::test]
    async fn test_success_writes_media_and_acks() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher {
            body: r#"<img src="photo.jpg" alt="p"><video><source src="clip.mp4?t=1"></video>"#
                .to_string(),
        });
        let pool = WorkerPool::new(&worker_config(1), queue.clone(), storage.clone(), fetcher);

        queue
            .enqueue_batch(&["https://x.test/dir/page.html".to_string()])
            .await
            .unwrap();
        let delivery = queue.dequeue().await.unwrap();

        let outcome = pool.process(delivery).await;
        assert_eq!(outcome, TaskOutcome::Succeeded { media_count: 2 });

        let media = storage.list_media(&MediaQuery::default()).unwrap();
        assert_eq!(media.total, 2);
        assert!(media
            .items
            .iter()
            .any(|m| m.media_url == "https://x.test/dir/photo.jpg"));
        assert_eq!(queue.depth().await.unwrap().leased, 0);
        assert_eq!(queue.depth().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_single_failure_record() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher {
            body: r#"<img src="never.png">"#.to_string(),
        });
        let pool = WorkerPool::new(&worker_config(1), queue.clone(), storage.clone(), fetcher);

        queue
            .enqueue_batch(&["https://fail.test/".to_string()])
            .await
            .unwrap();
        let delivery = queue.dequeue().await.unwrap();

        let outcome = pool.process(delivery).await;
        assert_eq!(outcome, TaskOutcome::Failed { kind: "timeout" });

        let outcomes = storage.outcomes_for("https://fail.test/").unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(storage.list_media(&MediaQuery::default()).unwrap().total, 0);
        assert!(queue.try_dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_media_and_outcome_share_submitted_url() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher {
            body: r#"<img src="pic.png"><video src="v.mp4"></video>"#.to_string(),
        });
        let pool = WorkerPool::new(&worker_config(1), queue.clone(), storage.clone(), fetcher);

        // Parsing lowercases the host and adds a trailing slash
        let submitted = "HTTPS://X.test";
        queue.enqueue_batch(&[submitted.to_string()]).await.unwrap();
        let outcome = pool.process(queue.dequeue().await.unwrap()).await;
        assert_eq!(outcome, TaskOutcome::Succeeded { media_count: 2 });

        let outcomes = storage.outcomes_for(submitted).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].source_url, submitted);

        let media = storage.list_media(&MediaQuery::default()).unwrap();
        assert_eq!(media.total, 2);
        assert!(media.items.iter().all(|m| m.source_url == submitted));
        assert!(media
            .items
            .iter()
            .any(|m| m.media_url == "https://x.test/pic.png"));
    }

    #[tokio::test]
    async fn test_empty_page_is_success() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher {
            body: "<p>nothing here</p>".to_string(),
        });
        let pool = WorkerPool::new(&worker_config(1), queue.clone(), storage.clone(), fetcher);

        queue
            .enqueue_batch(&["https://plain.test/".to_string()])
            .await
            .unwrap();
        let outcome = pool.process(queue.dequeue().await.unwrap()).await;

        assert_eq!(outcome, TaskOutcome::Succeeded { media_count: 0 });
        let outcomes = storage.outcomes_for("https://plain.test/").unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_persistence_error_leaves_task_for_redelivery() {
        let queue = test_queue(Duration::from_millis(50));
        let sink = Arc::new(FlakySink {
            inner: SqliteStorage::new_in_memory().unwrap(),
            healthy: AtomicBool::new(false),
        });
        let fetcher = Arc::new(ScriptedFetcher {
            body: r#"<img src="a.png">"#.to_string(),
        });
        let pool = WorkerPool::new(&worker_config(1), queue.clone(), sink.clone(), fetcher);

        queue
            .enqueue_batch(&["https://retry.test/".to_string()])
            .await
            .unwrap();

        let first = queue.dequeue().await.unwrap();
        assert_eq!(pool.process(first).await, TaskOutcome::Unacknowledged);
        assert_eq!(pool.stats().persistence_errors, 1);
        assert_eq!(pool.stats().processed, 0);

        sink.healthy.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let second = queue.dequeue().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(
            pool.process(second).await,
            TaskOutcome::Succeeded { media_count: 1 }
        );
        assert_eq!(sink.inner.outcomes_for("https://retry.test/").unwrap().len(), 1);
        assert!(queue.try_dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spawned_pool_drains_queue_and_shuts_down() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(ScriptedFetcher {
            body: r#"<img src="a.png">"#.to_string(),
        });

        let urls: Vec<String> = (0..30)
            .map(|i| {
                if i % 3 == 0 {
                    format!("https://fail.test/{}", i)
                } else {
                    format!("https://ok.test/{}", i)
                }
            })
            .collect();
        queue.enqueue_batch(&urls).await.unwrap();

        let handle =
            WorkerPool::new(&worker_config(4), queue.clone(), storage.clone(), fetcher).spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while handle.stats().processed < 30 {
            assert!(tokio::time::Instant::now() < deadline, "pool did not drain");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let snapshot = handle.shutdown().await;
        assert_eq!(snapshot.processed, 30);
        assert_eq!(snapshot.failed, 10);
        assert_eq!(snapshot.succeeded, 20);
        assert_eq!(snapshot.media_found, 20);

        let by_status = storage.count_outcomes_by_status().unwrap();
        assert_eq!(by_status.get(&OutcomeStatus::Succeeded), Some(&20));
        assert_eq!(by_status.get(&OutcomeStatus::Failed), Some(&10));
    }

    #[tokio::test]
    async fn test_in_flight_fetches_never_exceed_lane_count() {
        let queue = test_queue(Duration::from_secs(60));
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let fetcher = Arc::new(GaugedFetcher::default());

        let urls: Vec<String> = (0..40).map(|i| format!("https://gauge.test/{}", i)).collect();
        queue.enqueue_batch(&urls).await.unwrap();

        let handle =
            WorkerPool::new(&worker_config(3), queue.clone(), storage, fetcher.clone()).spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while handle.stats().processed < 40 {
            assert!(tokio::time::Instant::now() < deadline, "pool did not drain");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        let peak = fetcher.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight fetches was {}", peak);
        assert!(peak >= 2);
    }
}
