//! Route handlers for submission, listing, and statistics

use crate::api::ApiState;
use crate::crawler::MediaType;
use crate::output::load_statistics;
use crate::storage::MediaQuery;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Body of `POST /api/scrape`
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
}

/// Reply to an accepted submission
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeAccepted {
    pub message: String,
    pub accepted: usize,
}

/// Query string of `GET /api/media`
#[derive(Debug, Default, Deserialize)]
pub struct MediaParams {
    pub media_type: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// POST /api/scrape - Queue one task per submitted URL
pub async fn submit_urls(
    State(state): State<ApiState>,
    Json(request): Json<ScrapeRequest>,
) -> Response {
    match state.gateway.submit(&request.urls).await {
        Ok(accepted) => (
            StatusCode::ACCEPTED,
            Json(ScrapeAccepted {
                message: format!("{} tasks queued.", accepted),
                accepted,
            }),
        )
            .into_response(),
        Err(e) if e.is_rejection() => {
            tracing::warn!("Rejected submission: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::error!("Failed to queue submission: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/media - List stored media, newest first
pub async fn list_media(
    State(state): State<ApiState>,
    Query(params): Query<MediaParams>,
) -> Response {
    let media_type = match params.media_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match MediaType::from_db_str(&raw.to_ascii_lowercase()) {
            Some(media_type) => Some(media_type),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown media_type '{}', expected image or video", raw),
                )
            }
        },
    };

    let query = MediaQuery::new(media_type, params.search, params.page, params.per_page);
    let store = state.store.clone();

    match tokio::task::spawn_blocking(move || store.list_media(&query)).await {
        Ok(Ok(page)) => (StatusCode::OK, Json(page)).into_response(),
        Ok(Err(e)) => {
            tracing::error!("Failed to list media: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!("Media listing task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Media listing failed")
        }
    }
}

/// GET /api/stats - Queue depth and result totals
pub async fn stats(State(state): State<ApiState>) -> Response {
    match load_statistics(state.store.clone(), state.queue.as_ref()).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            tracing::error!("Failed to load statistics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /health - Health check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
