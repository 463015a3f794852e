//! Storage module for persisting task outcomes
//!
//! This module handles all result-side database operations, including:
//! - SQLite database initialization and schema management
//! - Batched media record inserts and failure records
//! - One outcome row per processed task
//! - Filtered, paginated media listing and statistics

pub mod schema;
mod sqlite;
mod traits;

pub use sqlite::{open_connection, open_in_memory_connection, SqliteStorage};
pub use traits::{MediaStore, ResultSink, StorageError, StorageResult};

use crate::crawler::MediaType;
use crate::state::OutcomeStatus;
use serde::Serialize;

/// Default number of media rows per page
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Largest page a caller may request
pub const MAX_PER_PAGE: u32 = 500;

/// A media record as stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMedia {
    pub id: i64,
    pub source_url: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub file_name: String,
    pub alt_text: String,
    pub created_at: String,
}

/// A recorded task outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub id: i64,
    pub source_url: String,
    pub status: OutcomeStatus,
    pub media_count: u32,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub recorded_at: String,
}

/// Filter and pagination for media listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    /// Only return media of this type
    pub media_type: Option<MediaType>,

    /// Case-insensitive substring match against alt text
    pub search: Option<String>,

    /// 1-based page number
    pub page: u32,

    pub per_page: u32,
}

impl MediaQuery {
    /// Builds a query, clamping page and page size into their valid ranges
    pub fn new(
        media_type: Option<MediaType>,
        search: Option<String>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Self {
        Self {
            media_type,
            search: search.filter(|s| !s.trim().is_empty()),
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Number of rows to skip
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

impl Default for MediaQuery {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

/// One page of media listing results
#[derive(Debug, Clone, Serialize)]
pub struct MediaPage {
    pub items: Vec<StoredMedia>,
    pub page: u32,
    pub per_page: u32,
    /// Total rows matching the filter, across all pages
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_query_clamps() {
        let query = MediaQuery::new(None, Some("  ".to_string()), Some(0), Some(10_000));
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, MAX_PER_PAGE);
        assert_eq!(query.search, None);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_media_query_offset() {
        let query = MediaQuery::new(Some(MediaType::Image), None, Some(3), Some(20));
        assert_eq!(query.offset(), 40);
        assert_eq!(MediaQuery::default().per_page, DEFAULT_PER_PAGE);
    }
}
