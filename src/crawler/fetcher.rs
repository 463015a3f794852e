//! HTTP fetcher implementation
//!
//! This module handles the single page request each task makes:
//! - Building the HTTP client with the configured user agent and timeout
//! - One GET per task, no retries
//! - Classifying failures into the kinds recorded in failure records

use crate::config::{UserAgentConfig, WorkerConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use serde::Serialize;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed before the request fails
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct Document {
    /// The URL that was requested
    pub url: Url,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Page body content
    pub body: String,
}

/// Reasons a fetch can fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("DNS resolution failed: {0}")]
    DnsFailure(String),

    #[error("HTTP {0}")]
    HttpError(u16),

    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Short machine-readable name of the failure kind, stored with failure records
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionRefused(_) => "connection_refused",
            Self::DnsFailure(_) => "dns_failure",
            Self::HttpError(_) => "http_error",
            Self::MalformedUrl(_) => "malformed_url",
            Self::Body(_) => "body",
            Self::Request(_) => "request",
        }
    }
}

/// Terminal failure outcome for a task, recorded in place of media records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub source_url: String,
    pub error_kind: String,
    pub error_message: String,
}

impl FailureRecord {
    pub fn from_fetch_error(source_url: &str, error: &FetchError) -> Self {
        Self {
            source_url: source_url.to_string(),
            error_kind: error.kind().to_string(),
            error_message: error.to_string(),
        }
    }
}

/// A client able to fetch one page
///
/// The worker pool only talks to this trait, so tests can substitute
/// instrumented or scripted clients for the real HTTP one.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetches `url` once
    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Upper bound for the whole request, body included
///
/// # Example
///
/// ```no_run
/// use media_sweep::config::UserAgentConfig;
/// use media_sweep::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "MediaSweep".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production fetch client backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher from the worker and user agent configuration
    pub fn new(worker: &WorkerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, worker.fetch_timeout())?;
        Ok(Self { client })
    }

    /// Wraps an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchClient for HttpFetcher {
    /// Fetches a URL with a single attempt
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Unparseable or non-HTTP(S) URL | MalformedUrl |
    /// | Timeout (connect or total) | Timeout |
    /// | Host name does not resolve | DnsFailure |
    /// | Connection refused / reset on connect | ConnectionRefused |
    /// | Non-2xx status | HttpError(status) |
    /// | Body could not be read | Body |
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let parsed = parse_fetch_url(url)?;

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        Ok(Document {
            url: parsed,
            final_url,
            status_code: status.as_u16(),
            body,
        })
    }
}

/// Parses a task URL, accepting only HTTP and HTTPS
pub fn parse_fetch_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| FetchError::MalformedUrl(format!("{}: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(FetchError::MalformedUrl(format!(
            "{}: only http and https URLs can be fetched",
            url
        )));
    }

    Ok(parsed)
}

/// Maps a reqwest error onto a fetch failure kind
fn classify_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }

    if error.is_builder() {
        return FetchError::MalformedUrl(error.to_string());
    }

    let detail = error_chain(error);

    if error.is_connect() {
        if is_dns_failure(&detail) {
            return FetchError::DnsFailure(detail);
        }
        return FetchError::ConnectionRefused(detail);
    }

    FetchError::Request(detail)
}

/// Joins an error and all of its sources into one message
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_dns_failure(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("dns error")
        || detail.contains("failed to lookup address")
        || detail.contains("name or service not known")
        || detail.contains("no such host")
}
