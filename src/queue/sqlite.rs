//! SQLite-backed task queue
//!
//! Tasks live in the `tasks` table until acknowledged. Dequeue claims the
//! oldest task that is pending or whose lease has run out, so a worker that
//! dies mid-task simply lets its lease lapse and the task is handed out again.
//!
//! Every statement runs on the blocking thread pool; the async side only
//! awaits the result.

use crate::config::QueueConfig;
use crate::queue::{Delivery, QueueDepth, QueueError, QueueResult, Task, TaskQueue};
use crate::storage::schema::initialize_queue_schema;
use crate::storage::{open_connection, open_in_memory_connection};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Durable at-least-once queue stored in SQLite
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
    /// Wakes lanes blocked in `dequeue` when this process enqueues work
    notify: Notify,
    lease: Duration,
    poll_interval: Duration,
}

impl SqliteQueue {
    /// Opens (or creates) the queue database at `path`
    pub fn open(path: &Path, config: &QueueConfig) -> QueueResult<Self> {
        let conn = open_connection(path)?;
        initialize_queue_schema(&conn)?;
        Ok(Self::from_connection(conn, config.lease(), config.poll_interval()))
    }

    /// Creates a queue backed by an in-memory database
    pub fn open_in_memory(lease: Duration, poll_interval: Duration) -> QueueResult<Self> {
        let conn = open_in_memory_connection()?;
        initialize_queue_schema(&conn)?;
        Ok(Self::from_connection(conn, lease, poll_interval))
    }

    fn from_connection(conn: Connection, lease: Duration, poll_interval: Duration) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            notify: Notify::new(),
            lease,
            poll_interval,
        }
    }

    /// Runs `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&mut Connection) -> QueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| QueueError::LockPoisoned)?;
            f(&mut conn)
        })
        .await?
    }

    /// Atomically leases the oldest claimable task
    async fn claim(&self) -> QueueResult<Option<Delivery>> {
        let lease = self.lease;

        self.with_conn(move |conn| {
            let now = Utc::now().timestamp_millis();
            let leased_until = now + lease.as_millis() as i64;

            let delivery = conn
                .query_row(
                    "UPDATE tasks
                     SET state = 'leased', attempts = attempts + 1, leased_until = ?1
                     WHERE id = (
                         SELECT id FROM tasks
                         WHERE state = 'pending' OR (state = 'leased' AND leased_until <= ?2)
                         ORDER BY id ASC
                         LIMIT 1
                     )
                     RETURNING id, url, attempts",
                    params![leased_until, now],
                    |row| {
                        Ok(Delivery {
                            id: row.get(0)?,
                            task: Task { url: row.get(1)? },
                            attempt: row.get(2)?,
                        })
                    },
                )
                .optional()?;

            Ok(delivery)
        })
        .await
    }
}

#[async_trait]
impl TaskQueue for SqliteQueue {
    async fn enqueue_batch(&self, urls: &[String]) -> QueueResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let batch = urls.to_vec();
        let accepted = self
            .with_conn(move |conn| {
                let now = Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO tasks (url, state, attempts, enqueued_at) VALUES (?1, 'pending', 0, ?2)",
                    )?;
                    for url in &batch {
                        stmt.execute(params![url, now])?;
                    }
                }
                tx.commit()?;
                Ok(batch.len())
            })
            .await?;

        self.notify.notify_waiters();
        tracing::debug!("Enqueued {} tasks", accepted);
        Ok(accepted)
    }

    async fn dequeue(&self) -> QueueResult<Delivery> {
        loop {
            // Register interest before checking, so an enqueue that lands
            // between the check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.claim().await? {
                return Ok(delivery);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn try_dequeue(&self) -> QueueResult<Option<Delivery>> {
        self.claim().await
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let id = delivery.id;
        let removed = self
            .with_conn(move |conn| Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?))
            .await?;
        if removed == 0 {
            tracing::debug!("Task {} was already acknowledged", id);
        }
        Ok(())
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        self.with_conn(|conn| {
            let now = Utc::now().timestamp_millis();
            let (pending, leased): (i64, i64) = conn.query_row(
                "SELECT
                     COALESCE(SUM(CASE WHEN state = 'pending' OR leased_until <= ?1 THEN 1 ELSE 0 END), 0),
                     COALESCE(SUM(CASE WHEN state = 'leased' AND leased_until > ?1 THEN 1 ELSE 0 END), 0)
                 FROM tasks",
                params![now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(QueueDepth {
                pending: pending as u64,
                leased: leased as u64,
            })
        })
        .await
    }
}
