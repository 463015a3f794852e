//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Media-Sweep
//! databases. The result sink and the task queue keep separate schemas so
//! they can live in one file or in two.

/// SQL schema for the result sink
pub const SINK_SCHEMA_SQL: &str = r#"
-- Extracted media references
CREATE TABLE IF NOT EXISTS media (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL,
    media_url TEXT NOT NULL,
    media_type TEXT NOT NULL CHECK (media_type IN ('image', 'video')),
    file_name TEXT NOT NULL,
    alt_text TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_source_url ON media(source_url);
CREATE INDEX IF NOT EXISTS idx_media_type ON media(media_type);
CREATE INDEX IF NOT EXISTS idx_media_created_at ON media(created_at DESC);

-- One row per processed task delivery, success or failure
CREATE TABLE IF NOT EXISTS outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('succeeded', 'failed')),
    media_count INTEGER NOT NULL DEFAULT 0,
    error_kind TEXT,
    error_message TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcomes_source_url ON outcomes(source_url);
CREATE INDEX IF NOT EXISTS idx_outcomes_status ON outcomes(status);
"#;

/// SQL schema for the task queue
pub const QUEUE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('pending', 'leased')),
    attempts INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL,
    -- Unix epoch milliseconds; NULL while pending
    leased_until INTEGER
);

CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state, leased_until);
"#;

/// Initializes the result sink schema
pub fn initialize_sink_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SINK_SCHEMA_SQL)
}

/// Initializes the task queue schema
pub fn initialize_queue_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(QUEUE_SCHEMA_SQL)
}
