//! Crawler module for page fetching and media extraction
//!
//! This module contains the task-processing logic, including:
//! - HTTP fetching with failure classification
//! - HTML parsing and media extraction
//! - The bounded worker pool that drives both

mod extractor;
mod fetcher;
mod pool;

pub use extractor::{extract_media, MediaRecord, MediaType};
pub use fetcher::{
    build_http_client, parse_fetch_url, Document, FailureRecord, FetchClient, FetchError,
    HttpFetcher,
};
pub use pool::{PoolHandle, PoolSnapshot, PoolStats, WorkerPool};
