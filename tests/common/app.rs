//! In-process application for HTTP and event-stream assertions

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;
use tower::ServiceExt;

use vidfetch::download::{ProgressBus, SessionRegistry, WorkerPool};
use vidfetch::web::{create_router, WebState};

use super::stub_fetcher::StubFetcher;

/// How long a test waits for a single event before giving up
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestApp {
    pub router: Router,
    pub bus: Arc<ProgressBus>,
    pub registry: Arc<SessionRegistry>,
    pub pool: Arc<WorkerPool>,
    pub fetcher: Arc<StubFetcher>,
    /// Scratch directory used as download destination and static root
    pub dir: TempDir,
}

impl TestApp {
    pub fn new(fetcher: StubFetcher) -> Self {
        Self::with_pool_size(fetcher, 4)
    }

    pub fn with_pool_size(fetcher: StubFetcher, size: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>vidfetch</html>").unwrap();

        let fetcher = Arc::new(fetcher);
        let bus = Arc::new(ProgressBus::new());
        let registry = Arc::new(SessionRegistry::new(bus.clone()));
        let pool = Arc::new(WorkerPool::new(fetcher.clone(), registry.clone(), size));

        let state = WebState::new(pool.clone(), vec![dir.path().to_path_buf()], dir.path().to_path_buf());
        let router = create_router(state);

        Self {
            router,
            bus,
            registry,
            pool,
            fetcher,
            dir,
        }
    }

    /// Destination directory for downloads in this test
    pub fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Starts a download of format `137+140` into `downloads()`
    pub async fn start_download(&self, id: &str) -> (StatusCode, Value) {
        self.post(
            "/download",
            serde_json::json!({
                "url": "https://www.example.com/watch?v=abc",
                "format_id": "137+140",
                "save_path": self.downloads().display().to_string(),
                "download_id": id,
            }),
        )
        .await
    }
}

/// Next event on a bus subscription, parsed as JSON
pub async fn next_event(receiver: &mut Receiver<String>) -> Value {
    let message = tokio::time::timeout(EVENT_TIMEOUT, receiver.recv())
        .await
        .expect("timed out waiting for a progress event")
        .expect("bus subscription closed");
    serde_json::from_str(&message).unwrap()
}

/// Collects the events of `id` up to and including its first terminal event
pub async fn events_until_terminal(receiver: &mut Receiver<String>, id: &str) -> Vec<Value> {
    let mut events = Vec::new();
    loop {
        let event = next_event(receiver).await;
        if event["download_id"] != id {
            continue;
        }
        let terminal = matches!(event["status"].as_str(), Some("completed") | Some("error"));
        events.push(event);
        if terminal {
            return events;
        }
    }
}

pub fn statuses(events: &[Value]) -> Vec<&str> {
    events.iter().filter_map(|e| e["status"].as_str()).collect()
}
