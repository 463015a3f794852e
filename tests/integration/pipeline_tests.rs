//! Integration tests for the submit, process, persist pipeline
//!
//! These tests use wiremock to serve origin pages and file-backed SQLite
//! databases for the queue and the result store.

use media_sweep::config::{QueueConfig, UserAgentConfig, WorkerConfig};
use media_sweep::crawler::{build_http_client, HttpFetcher, MediaType, PoolHandle, WorkerPool};
use media_sweep::gateway::{SubmissionError, SubmissionGateway};
use media_sweep::queue::{SqliteQueue, TaskQueue};
use media_sweep::state::OutcomeStatus;
use media_sweep::storage::{MediaQuery, MediaStore, SqliteStorage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn worker_config(concurrency: u32) -> WorkerConfig {
    WorkerConfig {
        concurrency,
        fetch_timeout_secs: 5,
    }
}

fn queue_config(db_path: &Path) -> QueueConfig {
    QueueConfig {
        database_path: db_path.to_string_lossy().into_owned(),
        lease_secs: 30,
        poll_interval_ms: 20,
    }
}

/// Opens the queue and the result store on one database file
fn open_pipeline(dir: &TempDir) -> (Arc<SqliteQueue>, Arc<SqliteStorage>) {
    let db_path = dir.path().join("sweep.db");
    let queue = Arc::new(SqliteQueue::open(&db_path, &queue_config(&db_path)).unwrap());
    let storage = Arc::new(SqliteStorage::new(&db_path).unwrap());
    (queue, storage)
}

/// Waits until the pool has persisted `expected` outcomes
async fn wait_for_processed(handle: &PoolHandle, expected: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while handle.stats().processed < expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {} of {} tasks processed",
            handle.stats().processed,
            expected
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_submitted_urls_each_reach_one_outcome() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/gallery/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <img src="photo.jpg" alt="A photo">
                    <img alt="no source">
                    <img src="/static/logo.png?v=2">
                    <video src="intro.webm"></video>
                    <video><source src="clip.mp4?t=1"></video>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Nothing to see</p></body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let (queue, storage) = open_pipeline(&dir);

    let gallery = format!("{}/gallery/index.html", base_url);
    let empty = format!("{}/empty", base_url);
    let missing = format!("{}/missing", base_url);
    let malformed = "not a url".to_string();

    let gateway = SubmissionGateway::new(queue.clone(), 100);
    let accepted = gateway
        .submit(&[gallery.clone(), empty.clone(), missing.clone(), malformed.clone()])
        .await
        .unwrap();
    assert_eq!(accepted, 4);

    let fetcher = Arc::new(HttpFetcher::new(&worker_config(3), &user_agent()).unwrap());
    let handle =
        WorkerPool::new(&worker_config(3), queue.clone(), storage.clone(), fetcher).spawn();

    wait_for_processed(&handle, 4).await;
    let snapshot = handle.shutdown().await;
    assert_eq!(snapshot.succeeded, 2);
    assert_eq!(snapshot.failed, 2);
    assert_eq!(snapshot.media_found, 4);

    // Gallery: two images then two videos, resolved against the page URL
    let gallery_outcomes = storage.outcomes_for(&gallery).unwrap();
    assert_eq!(gallery_outcomes.len(), 1);
    assert_eq!(gallery_outcomes[0].status, OutcomeStatus::Succeeded);
    assert_eq!(gallery_outcomes[0].media_count, 4);

    let images = storage
        .list_media(&MediaQuery::new(Some(MediaType::Image), None, None, None))
        .unwrap();
    let mut image_urls: Vec<_> = images.items.iter().map(|m| m.media_url.clone()).collect();
    image_urls.sort();
    assert_eq!(
        image_urls,
        vec![
            format!("{}/gallery/photo.jpg", base_url),
            format!("{}/static/logo.png?v=2", base_url),
        ]
    );

    let videos = storage
        .list_media(&MediaQuery::new(Some(MediaType::Video), None, None, None))
        .unwrap();
    let mut video_names: Vec<_> = videos.items.iter().map(|m| m.file_name.clone()).collect();
    video_names.sort();
    assert_eq!(video_names, vec!["clip.mp4", "intro.webm"]);
    assert!(videos.items.iter().all(|m| m.alt_text.is_empty()));

    // Empty page: a success with no media
    let empty_outcomes = storage.outcomes_for(&empty).unwrap();
    assert_eq!(empty_outcomes.len(), 1);
    assert_eq!(empty_outcomes[0].status, OutcomeStatus::Succeeded);
    assert_eq!(empty_outcomes[0].media_count, 0);

    // 404: one failure record
    let missing_outcomes = storage.outcomes_for(&missing).unwrap();
    assert_eq!(missing_outcomes.len(), 1);
    assert_eq!(missing_outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(missing_outcomes[0].error_kind.as_deref(), Some("http_error"));

    let malformed_outcomes = storage.outcomes_for(&malformed).unwrap();
    assert_eq!(malformed_outcomes.len(), 1);
    assert_eq!(
        malformed_outcomes[0].error_kind.as_deref(),
        Some("malformed_url")
    );

    // Everything acknowledged
    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 0);
    assert_eq!(depth.leased, 0);
}

#[tokio::test]
async fn test_timed_out_fetch_records_single_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<img src="late.png">"#)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let (queue, storage) = open_pipeline(&dir);
    let slow = format!("{}/slow", mock_server.uri());

    queue.enqueue_batch(&[slow.clone()]).await.unwrap();

    let client = build_http_client(&user_agent(), Duration::from_millis(300)).unwrap();
    let fetcher = Arc::new(HttpFetcher::with_client(client));
    let handle =
        WorkerPool::new(&worker_config(1), queue.clone(), storage.clone(), fetcher).spawn();

    wait_for_processed(&handle, 1).await;
    handle.shutdown().await;

    let outcomes = storage.outcomes_for(&slow).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].error_kind.as_deref(), Some("timeout"));
    assert_eq!(storage.list_media(&MediaQuery::default()).unwrap().total, 0);
}

#[tokio::test]
async fn test_rejected_submissions_enqueue_nothing() {
    let dir = TempDir::new().unwrap();
    let (queue, _storage) = open_pipeline(&dir);
    let gateway = SubmissionGateway::new(queue.clone(), 5);

    let err = gateway.submit(&[]).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Empty));

    let urls: Vec<String> = (0..6).map(|i| format!("https://x.test/{}", i)).collect();
    let err = gateway.submit(&urls).await.unwrap_err();
    assert!(matches!(err, SubmissionError::TooLarge { len: 6, max: 5 }));

    let depth = queue.depth().await.unwrap();
    assert_eq!(depth.pending, 0);
    assert_eq!(depth.leased, 0);
}

#[tokio::test]
async fn test_queued_tasks_survive_reopen() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<img src="a.png">"#))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let page = format!("{}/page", mock_server.uri());

    {
        let (queue, _storage) = open_pipeline(&dir);
        let gateway = SubmissionGateway::new(queue, 10);
        assert_eq!(gateway.submit(&[page.clone()]).await.unwrap(), 1);
    }

    let (queue, storage) = open_pipeline(&dir);
    assert_eq!(queue.depth().await.unwrap().pending, 1);

    let fetcher = Arc::new(HttpFetcher::new(&worker_config(2), &user_agent()).unwrap());
    let handle =
        WorkerPool::new(&worker_config(2), queue.clone(), storage.clone(), fetcher).spawn();

    wait_for_processed(&handle, 1).await;
    handle.shutdown().await;

    let media = storage.list_media(&MediaQuery::default()).unwrap();
    assert_eq!(media.total, 1);
    assert_eq!(media.items[0].file_name, "a.png");
    assert_eq!(media.items[0].source_url, page);
}
