//! HTTP and WebSocket surface of the download server

pub mod error;
pub mod handlers;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::download::fetcher::MediaFetcher;
use crate::download::registry::SessionRegistry;
use crate::download::worker::WorkerPool;

/// Shared state for all endpoints
#[derive(Clone)]
pub struct WebState {
    pub registry: Arc<SessionRegistry>,
    pub pool: Arc<WorkerPool>,
    pub fetcher: Arc<dyn MediaFetcher>,
    /// Candidate directories offered by `/download-paths`
    pub download_paths: Arc<Vec<PathBuf>>,
    /// Directory holding `index.html` and the front-end assets
    pub static_dir: PathBuf,
    pub start_time: Instant,
}

impl WebState {
    pub fn new(pool: Arc<WorkerPool>, download_paths: Vec<PathBuf>, static_dir: PathBuf) -> Self {
        Self {
            registry: pool.registry().clone(),
            fetcher: pool.fetcher().clone(),
            pool,
            download_paths: Arc::new(download_paths),
            static_dir,
            start_time: Instant::now(),
        }
    }
}

/// Builds the application router
pub fn create_router(state: WebState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route_service("/", index)
        .nest_service("/static", assets)
        .route("/video-info", get(handlers::video_info))
        .route("/info", post(handlers::video_info_post))
        .route("/download", post(handlers::start_download))
        .route("/toggle-download", post(handlers::toggle_download))
        .route("/videos", get(handlers::list_videos))
        .route("/download-paths", get(handlers::download_paths))
        .route("/open-folder", post(handlers::open_folder))
        .route("/select-folder", post(handlers::select_folder))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(cors)
        .with_state(state)
}

/// Binds `host:port` and serves the router until the process exits
pub async fn start_web_server(host: &str, port: u16, state: WebState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let app = create_router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /             - front-end");
    log::info!("  /ws           - progress events (WebSocket)");
    log::info!("  /metrics      - Prometheus metrics");
    log::info!("  /health       - health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
