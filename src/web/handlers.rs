use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::core::error::AppError;
use crate::core::metrics;
use crate::desktop;
use crate::download::formats::VideoInfoResponse;
use crate::download::session::NewSession;
use crate::web::WebState;

// ============================================================================
// REQUEST / RESPONSE BODIES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VideoInfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    pub format_id: Option<String>,
    pub save_path: Option<String>,
    /// Client-chosen session id; generated when absent
    pub download_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub status: String,
    pub message: String,
    pub save_path: String,
    pub download_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub action: Option<String>,
    pub download_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    /// `success` when the state changed, `noop` when it already matched
    pub status: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenFolderRequest {
    pub path: Option<String>,
}

// ============================================================================
// HELPERS
// ============================================================================

/// Non-blank value of an optional request field.
fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw).map_err(|e| AppError::Validation(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!("Unsupported URL scheme '{}'", other))),
    }
}

async fn lookup(state: &WebState, raw_url: Option<String>) -> Result<Json<VideoInfoResponse>, AppError> {
    let raw_url = required(raw_url).ok_or_else(|| AppError::Validation("URL is required".to_string()))?;
    let url = parse_url(&raw_url)?;

    log::info!("Video info request for {}", url);
    let info = state.fetcher.lookup(url.as_str()).await?;
    Ok(Json(VideoInfoResponse::from_info(&info)))
}

/// Whether `path` is an existing directory we are allowed to write into.
async fn is_writable_dir(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => false,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /video-info?url=
pub async fn video_info(
    State(state): State<WebState>,
    Query(query): Query<VideoInfoQuery>,
) -> Result<Json<VideoInfoResponse>, AppError> {
    lookup(&state, query.url).await
}

/// POST /info
pub async fn video_info_post(
    State(state): State<WebState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> Result<Json<VideoInfoResponse>, AppError> {
    let Json(request) = payload?;
    lookup(&state, request.url).await
}

/// POST /download - registers a session and starts its worker.
///
/// Responds as soon as the session is registered; the outcome of the
/// transfer is only reported over the WebSocket.
pub async fn start_download(
    State(state): State<WebState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, AppError> {
    let Json(request) = payload?;

    let (url, format_id, save_path) = match (
        required(request.url),
        required(request.format_id),
        required(request.save_path),
    ) {
        (Some(url), Some(format_id), Some(save_path)) => (url, format_id, save_path),
        _ => return Err(AppError::Validation("Missing required parameters".to_string())),
    };
    let url = parse_url(&url)?;
    let download_id = required(request.download_id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let destination = PathBuf::from(shellexpand::tilde(&save_path).into_owned());

    let session = state
        .registry
        .create(NewSession {
            id: download_id.clone(),
            url: url.to_string(),
            format_selector: format_id,
            destination,
        })
        .await?;

    state.pool.spawn(session);

    Ok(Json(DownloadResponse {
        status: "success".to_string(),
        message: "Download started".to_string(),
        save_path,
        download_id,
    }))
}

/// POST /toggle-download - pause or resume a session.
pub async fn toggle_download(
    State(state): State<WebState>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>, AppError> {
    let Json(request) = payload?;
    let action = request.action.unwrap_or_default();
    let download_id = request.download_id.unwrap_or_default();

    if state.registry.status(&download_id).await.is_none() {
        return Err(AppError::UnknownSession(download_id));
    }

    let changed = match action.as_str() {
        "pause" => state.registry.pause(&download_id).await,
        "resume" => state.registry.resume(&download_id).await,
        _ => return Err(AppError::UnknownAction(action)),
    };

    let status = if changed { "success" } else { "noop" };
    Ok(Json(ToggleResponse {
        status: status.to_string(),
        action,
    }))
}

/// GET /videos - every session known to this process.
pub async fn list_videos(State(state): State<WebState>) -> impl IntoResponse {
    let videos = state.registry.summaries().await;
    Json(serde_json::json!({ "videos": videos }))
}

/// GET /download-paths - configured download directories that are writable.
pub async fn download_paths(State(state): State<WebState>) -> impl IntoResponse {
    let mut paths = Vec::new();
    for path in state.download_paths.iter() {
        if is_writable_dir(path).await {
            paths.push(path.display().to_string());
        }
    }
    Json(serde_json::json!({ "paths": paths }))
}

/// POST /open-folder - reveal the folder containing `path`.
pub async fn open_folder(
    payload: Result<Json<OpenFolderRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(request) = payload?;
    let path = required(request.path).ok_or_else(|| AppError::Validation("Path is required".to_string()))?;

    let folder = match Path::new(&path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !tokio::fs::try_exists(&folder).await.unwrap_or(false) {
        return Err(AppError::Validation("Folder not found".to_string()));
    }

    desktop::open_folder(&folder).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// POST /select-folder - native folder picker.
pub async fn select_folder() -> impl IntoResponse {
    let path = desktop::pick_folder().await.map(|p| p.display().to_string());
    Json(serde_json::json!({ "path": path }))
}

/// GET /health
pub async fn health(State(state): State<WebState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed();
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime.as_secs(),
        "service": "vidfetch",
        "version": env!("CARGO_PKG_VERSION"),
        "connected_observers": state.registry.bus().observer_count().await,
        "free_worker_slots": state.pool.available_slots(),
    }))
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> Response {
    match metrics::render() {
        Ok((content_type, buffer)) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], buffer).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}
