//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the result sink and
//! the media read traits.

use crate::crawler::{FailureRecord, MediaRecord, MediaType};
use crate::state::OutcomeStatus;
use crate::storage::schema::initialize_sink_schema;
use crate::storage::traits::{MediaStore, ResultSink, StorageError, StorageResult};
use crate::storage::{MediaPage, MediaQuery, OutcomeRecord, StoredMedia};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection is guarded by a mutex so every worker lane can write
/// through a shared reference. Writes run on the blocking thread pool; the
/// synchronous reads are expected to be called from it too.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        initialize_sink_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = open_in_memory_connection()?;
        initialize_sink_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Runs `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl ResultSink for SqliteStorage {
    async fn write_media(&self, source_url: &str, records: &[MediaRecord]) -> StorageResult<()> {
        let source_url = source_url.to_owned();
        let records = records.to_vec();

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();

            // Media rows and the outcome row land together or not at all
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO media (source_url, media_url, media_type, file_name, alt_text, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.source_url,
                        record.media_url,
                        record.media_type.as_str(),
                        record.file_name,
                        record.alt_text,
                        now
                    ])?;
                }
            }
            tx.execute(
                "INSERT INTO outcomes (source_url, status, media_count, recorded_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    source_url,
                    OutcomeStatus::Succeeded.to_db_string(),
                    records.len() as i64,
                    now
                ],
            )?;
            tx.commit()?;

            Ok(())
        })
        .await
    }

    async fn write_failure(&self, record: &FailureRecord) -> StorageResult<()> {
        let record = record.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO outcomes (source_url, status, media_count, error_kind, error_message, recorded_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?5)",
                params![
                    record.source_url,
                    OutcomeStatus::Failed.to_db_string(),
                    record.error_kind,
                    record.error_message,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }
}

impl MediaStore for SqliteStorage {
    fn list_media(&self, query: &MediaQuery) -> StorageResult<MediaPage> {
        let conn = self.lock()?;

        let media_type = query.media_type.map(|t| t.as_str());
        let search = query.search.as_deref();

        // instr() instead of LIKE so '%' and '_' in the search text are literal
        let filter = "(?1 IS NULL OR media_type = ?1)
             AND (?2 IS NULL OR instr(lower(alt_text), lower(?2)) > 0)";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM media WHERE {}", filter),
            params![media_type, search],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, source_url, media_url, media_type, file_name, alt_text, created_at
             FROM media WHERE {}
             ORDER BY id DESC
             LIMIT ?3 OFFSET ?4",
            filter
        ))?;

        let rows = stmt.query_map(
            params![media_type, search, query.per_page, query.offset() as i64],
            |row| stored_media_from_row(row),
        )?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }

        Ok(MediaPage {
            items,
            page: query.page,
            per_page: query.per_page,
            total: total as u64,
        })
    }

    fn count_media_by_type(&self) -> StorageResult<HashMap<MediaType, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT media_type, COUNT(*) FROM media GROUP BY media_type")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (type_str, count) = row?;
            if let Some(media_type) = MediaType::from_db_str(&type_str) {
                counts.insert(media_type, count as u64);
            }
        }

        Ok(counts)
    }

    fn count_outcomes_by_status(&self) -> StorageResult<HashMap<OutcomeStatus, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM outcomes GROUP BY status")?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = OutcomeStatus::from_db_string(&status_str) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn failure_summary(&self) -> StorageResult<HashMap<String, u64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(error_kind, 'unknown'), COUNT(*) FROM outcomes
             WHERE status = ?1 GROUP BY error_kind",
        )?;

        let rows = stmt.query_map(params![OutcomeStatus::Failed.to_db_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut summary = HashMap::new();
        for row in rows {
            let (kind, count) = row?;
            summary.insert(kind, count);
        }

        Ok(summary)
    }

    fn outcomes_for(&self, source_url: &str) -> StorageResult<Vec<OutcomeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_url, status, media_count, error_kind, error_message, recorded_at
             FROM outcomes WHERE source_url = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![source_url], |row| {
            let status: String = row.get(2)?;
            Ok((
                status,
                OutcomeRecord {
                    id: row.get(0)?,
                    source_url: row.get(1)?,
                    status: OutcomeStatus::Failed,
                    media_count: row.get(3)?,
                    error_kind: row.get(4)?,
                    error_message: row.get(5)?,
                    recorded_at: row.get(6)?,
                },
            ))
        })?;

        let mut outcomes = Vec::new();
        for row in rows {
            let (status_str, mut outcome) = row?;
            outcome.status = OutcomeStatus::from_db_string(&status_str)
                .ok_or_else(|| StorageError::InvalidValue(format!("outcome status '{}'", status_str)))?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

/// Maps a media row, rejecting unknown media types
fn stored_media_from_row(row: &Row<'_>) -> rusqlite::Result<StorageResult<StoredMedia>> {
    let type_str: String = row.get(3)?;
    let Some(media_type) = MediaType::from_db_str(&type_str) else {
        return Ok(Err(StorageError::InvalidValue(format!(
            "media type '{}'",
            type_str
        ))));
    };

    Ok(Ok(StoredMedia {
        id: row.get(0)?,
        source_url: row.get(1)?,
        media_url: row.get(2)?,
        media_type,
        file_name: row.get(4)?,
        alt_text: row.get(5)?,
        created_at: row.get(6)?,
    }))
}

/// Opens a database file with the pragmas every Media-Sweep connection uses
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(Connection)` - Successfully opened/created database
/// * `Err(rusqlite::Error)` - Failed to open database
pub fn open_connection(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    Ok(conn)
}

/// Opens a private in-memory database
pub fn open_in_memory_connection() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}
