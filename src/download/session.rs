//! Download session record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle state of a download session.
///
/// `Running` and `Paused` alternate freely; `Completed` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Running,
    Paused,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared pause flag, set by the registry and read by the worker.
///
/// Pausing is advisory: the worker stops reporting progress while the gate
/// is closed, the transfer itself keeps going. The gate is checked both when
/// progress is reported and again before queued progress reaches the bus.
#[derive(Debug, Clone, Default)]
pub struct PauseGate(Arc<AtomicBool>);

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.0.store(paused, Ordering::Release);
    }
}

/// Inputs for a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub url: String,
    pub format_selector: String,
    pub destination: PathBuf,
}

/// A user-initiated download of one URL in one format into one directory.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub id: String,
    pub url: String,
    /// Format id as chosen by the user, `v+a` for a merged pair
    pub format_selector: String,
    pub destination: PathBuf,
    pub state: SessionState,
    pub gate: PauseGate,
    pub created_at: DateTime<Utc>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl DownloadSession {
    pub fn new(new: NewSession) -> Self {
        Self {
            id: new.id,
            url: new.url,
            format_selector: new.format_selector,
            destination: new.destination,
            state: SessionState::Running,
            gate: PauseGate::new(),
            created_at: Utc::now(),
            output_path: None,
            error: None,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            download_id: self.id.clone(),
            url: self.url.clone(),
            format_id: self.format_selector.clone(),
            save_path: self.destination.display().to_string(),
            status: self.state,
            created_at: self.created_at,
            path: self.output_path.as_ref().map(|p| p.display().to_string()),
            error: self.error.clone(),
        }
    }
}

/// Serializable view of a session for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub download_id: String,
    pub url: String,
    pub format_id: String,
    pub save_path: String,
    pub status: SessionState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
