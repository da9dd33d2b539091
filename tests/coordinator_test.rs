//! End-to-end tests for the download coordinator
//!
//! Every test drives the real router, registry, worker pool and bus with a
//! scripted fetcher and reads the events an observer would receive.

mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

use common::{events_until_terminal, finished, next_event, progress, statuses, Latch, Output, Step, StubFetcher, TestApp};
use vidfetch::download::SessionState;

/// Asserts nothing else arrives for `id` within a short grace period
async fn assert_quiet(receiver: &mut tokio::sync::mpsc::Receiver<String>, id: &str) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(message) = receiver.try_recv() {
        let event: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_ne!(event["download_id"], id, "unexpected extra event {}", event);
    }
}

// ==== Successful Download Tests ====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_then_completed() {
    let fetcher = StubFetcher::new().with_steps(vec![progress(0, 1024), progress(512, 1024), progress(1024, 1024)]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    let (status, body) = app.start_download("d1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Download started");
    assert_eq!(body["download_id"], "d1");

    let events = events_until_terminal(&mut sub.receiver, "d1").await;
    assert_eq!(statuses(&events), vec!["downloading", "downloading", "downloading", "completed"]);

    let percents: Vec<f64> = events[..3].iter().map(|e| e["percent"].as_f64().unwrap()).collect();
    assert_eq!(percents, vec![0.0, 50.0, 100.0]);
    assert_eq!(events[1]["speed"], 1_048_576.0);
    assert_eq!(events[1]["eta"], 3);

    assert_eq!(events[3]["title"], "clip");
    let path = events[3]["path"].as_str().unwrap();
    assert!(path.ends_with("clip.mp4"), "unexpected path {}", path);
    assert_eq!(std::fs::metadata(path).unwrap().len(), 1024);

    assert_eq!(app.registry.status("d1").await, Some(SessionState::Completed));
    assert_quiet(&mut sub.receiver, "d1").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_converting_precedes_completed() {
    let fetcher = StubFetcher::new().with_steps(vec![progress(1024, 1024), finished()]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    let events = events_until_terminal(&mut sub.receiver, "d1").await;

    assert_eq!(statuses(&events), vec!["downloading", "converting", "completed"]);
    assert_eq!(events[1]["message"], "Converting video format...");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_destination_created_and_request_forwarded() {
    let app = TestApp::new(StubFetcher::new());
    let mut sub = app.bus.subscribe().await;
    assert!(!app.downloads().exists());

    app.start_download("d1").await;
    events_until_terminal(&mut sub.receiver, "d1").await;

    assert!(app.downloads().is_dir());
    let requests = app.fetcher.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://www.example.com/watch?v=abc");
    assert_eq!(requests[0].format_selector, "137+140");
    assert_eq!(requests[0].destination, app.downloads());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_generated_download_id() {
    let app = TestApp::new(StubFetcher::new());
    let mut sub = app.bus.subscribe().await;

    let (status, body) = app
        .post(
            "/download",
            json!({
                "url": "https://www.example.com/watch?v=abc",
                "format_id": "18",
                "save_path": app.downloads().display().to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let id = body["download_id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 36);
    let events = events_until_terminal(&mut sub.receiver, &id).await;
    assert_eq!(statuses(&events), vec!["completed"]);
}

// ==== Failure Tests ====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_output_fails_once() {
    let fetcher = StubFetcher::new()
        .with_steps(vec![progress(512, 1024)])
        .with_output(Output::File {
            stem: "clip".to_string(),
            ext: "mp4".to_string(),
            bytes: 0,
        });
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    let events = events_until_terminal(&mut sub.receiver, "d1").await;

    assert_eq!(statuses(&events), vec!["downloading", "error"]);
    assert_eq!(events[1]["error"], "Download failed: File is empty (0 bytes)");
    assert_eq!(app.registry.status("d1").await, Some(SessionState::Failed));
    assert_quiet(&mut sub.receiver, "d1").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_tools_fail_before_fetch() {
    let app = TestApp::new(StubFetcher::new().without_tools());
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    let events = events_until_terminal(&mut sub.receiver, "d1").await;

    assert_eq!(statuses(&events), vec!["error"]);
    assert_eq!(events[0]["error"], "ffmpeg is not available");
    assert_eq!(app.fetcher.fetch_count(), 0);
    assert_eq!(app.registry.status("d1").await, Some(SessionState::Failed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transfer_failure_reported() {
    let fetcher = StubFetcher::new()
        .with_steps(vec![progress(100, 1024)])
        .with_output(Output::Fail("HTTP Error 403: Forbidden".to_string()));
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    let events = events_until_terminal(&mut sub.receiver, "d1").await;

    assert_eq!(statuses(&events), vec!["downloading", "error"]);
    assert_eq!(events[1]["error"], "Download failed: HTTP Error 403: Forbidden");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_id_rejected_while_running() {
    let latch = Latch::new();
    let fetcher = StubFetcher::new().with_steps(vec![progress(1, 1024), Step::WaitFor(latch.clone())]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    let (status, _) = app.start_download("d1").await;
    assert_eq!(status, StatusCode::OK);
    let first = next_event(&mut sub.receiver).await;
    assert_eq!(first["status"], "downloading");

    let (status, body) = app.start_download("d1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Download id 'd1' is already in progress");

    latch.release();
    let events = events_until_terminal(&mut sub.receiver, "d1").await;
    assert_eq!(statuses(&events), vec!["completed"]);
    assert_eq!(app.fetcher.fetch_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_finished_id_can_be_reused() {
    let app = TestApp::new(StubFetcher::new());
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    events_until_terminal(&mut sub.receiver, "d1").await;

    let (status, _) = app.start_download("d1").await;
    assert_eq!(status, StatusCode::OK);
    let events = events_until_terminal(&mut sub.receiver, "d1").await;
    assert_eq!(statuses(&events), vec!["completed"]);
    assert_eq!(app.fetcher.fetch_count(), 2);
}

// ==== Pause / Resume Tests ====

#[tokio::test]
async fn test_toggle_unknown_id_is_not_found() {
    let app = TestApp::new(StubFetcher::new());

    let (status, body) = app
        .post("/toggle-download", json!({"action": "pause", "download_id": "nope"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Unknown download id 'nope'");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pause_suppresses_progress_only() {
    let latch = Latch::new();
    let fetcher = StubFetcher::new().with_steps(vec![
        progress(100, 1000),
        Step::WaitFor(latch.clone()),
        progress(500, 1000),
        progress(900, 1000),
        finished(),
    ]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    assert_eq!(next_event(&mut sub.receiver).await["status"], "downloading");

    let (status, body) = app
        .post("/toggle-download", json!({"action": "pause", "download_id": "d1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(app.registry.status("d1").await, Some(SessionState::Paused));

    latch.release();
    let events = events_until_terminal(&mut sub.receiver, "d1").await;

    assert_eq!(statuses(&events), vec!["paused", "converting", "completed"]);
    assert_eq!(app.registry.status("d1").await, Some(SessionState::Completed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resume_restores_progress() {
    let latch = Latch::new();
    let resumed = Latch::new();
    let fetcher = StubFetcher::new().with_steps(vec![
        progress(100, 1000),
        Step::WaitFor(latch.clone()),
        progress(400, 1000),
        Step::WaitFor(resumed.clone()),
        progress(800, 1000),
    ]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    next_event(&mut sub.receiver).await;

    app.post("/toggle-download", json!({"action": "pause", "download_id": "d1"}))
        .await;
    latch.release();

    let (_, body) = app
        .post("/toggle-download", json!({"action": "resume", "download_id": "d1"}))
        .await;
    assert_eq!(body["status"], "success");
    resumed.release();

    let events = events_until_terminal(&mut sub.receiver, "d1").await;
    let seen = statuses(&events);
    assert_eq!(seen.first(), Some(&"paused"));
    assert_eq!(&seen[seen.len() - 3..], &["resumed", "downloading", "completed"]);
    assert_eq!(events[events.len() - 2]["percent"], 80.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_toggle_noop_transitions() {
    let latch = Latch::new();
    let fetcher = StubFetcher::new().with_steps(vec![Step::WaitFor(latch.clone())]);
    let app = TestApp::new(fetcher);
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;

    let (status, body) = app
        .post("/toggle-download", json!({"action": "resume", "download_id": "d1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "noop", "action": "resume"}));

    latch.release();
    events_until_terminal(&mut sub.receiver, "d1").await;

    let (status, body) = app
        .post("/toggle-download", json!({"action": "pause", "download_id": "d1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "noop");
    assert_eq!(app.registry.status("d1").await, Some(SessionState::Completed));
    assert_quiet(&mut sub.receiver, "d1").await;
}

#[tokio::test]
async fn test_toggle_invalid_action_is_not_found() {
    let app = TestApp::new(StubFetcher::new().with_steps(vec![Step::Sleep(Duration::from_millis(50))]));
    app.start_download("d1").await;

    let (status, body) = app
        .post("/toggle-download", json!({"action": "stop", "download_id": "d1"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Unknown action 'stop'");
}

// ==== Listing Tests ====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_videos_lists_finished_sessions() {
    let app = TestApp::new(StubFetcher::new());
    let mut sub = app.bus.subscribe().await;

    app.start_download("d1").await;
    events_until_terminal(&mut sub.receiver, "d1").await;

    let (status, body) = app.get("/videos").await;
    assert_eq!(status, StatusCode::OK);

    let videos = body["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["download_id"], "d1");
    assert_eq!(videos[0]["status"], "completed");
    assert_eq!(videos[0]["format_id"], "137+140");
    assert!(videos[0]["path"].as_str().unwrap().ends_with("clip.mp4"));
}
