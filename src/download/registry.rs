use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::error::AppError;
use crate::core::metrics;
use crate::download::bus::ProgressBus;
use crate::download::events::ProgressEvent;
use crate::download::session::{DownloadSession, NewSession, SessionState, SessionSummary};

/// Table of all download sessions known to the server.
///
/// Every state transition goes through here. The session map is guarded by a
/// single mutex; control events (`paused`, `resumed`, `completed`, `error`)
/// are broadcast on the [`ProgressBus`] after the lock has been released, so
/// observers never stall a transition.
///
/// Pause and resume additionally hold a toggle lock across the state change
/// and its broadcast, so `paused`/`resumed` reach observers in the order the
/// state changed and the last one seen matches the final state.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use vidfetch::download::bus::ProgressBus;
/// use vidfetch::download::registry::SessionRegistry;
/// use vidfetch::download::session::NewSession;
///
/// # async fn example() -> Result<(), vidfetch::core::AppError> {
/// let registry = SessionRegistry::new(Arc::new(ProgressBus::new()));
/// let session = registry
///     .create(NewSession {
///         id: "d1".to_string(),
///         url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
///         format_selector: "137+a".to_string(),
///         destination: PathBuf::from("/tmp/videos"),
///     })
///     .await?;
/// registry.pause(&session.id).await;
/// # Ok(())
/// # }
/// ```
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, DownloadSession>>,
    toggles: Mutex<()>,
    bus: Arc<ProgressBus>,
}

impl SessionRegistry {
    pub fn new(bus: Arc<ProgressBus>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            toggles: Mutex::new(()),
            bus,
        }
    }

    /// Bus the registry publishes control events on.
    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Registers a new session in the `Running` state.
    ///
    /// Fails with [`AppError::DuplicateSession`] when a session with the same
    /// id is still running or paused. A finished session under the same id is
    /// replaced.
    pub async fn create(&self, new: NewSession) -> Result<DownloadSession, AppError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(&new.id) {
            if !existing.state.is_terminal() {
                warn!("Rejecting duplicate download id {} ({})", new.id, existing.state);
                return Err(AppError::DuplicateSession(new.id));
            }
            debug!("Replacing finished session {} ({})", new.id, existing.state);
        }

        let session = DownloadSession::new(new);
        sessions.insert(session.id.clone(), session.clone());
        drop(sessions);

        let kind = if session.format_selector.contains('+') { "merged" } else { "single" };
        metrics::record_session_created(kind);
        info!(
            "Session {} created: url={}, format={}, destination={}",
            session.id,
            session.url,
            session.format_selector,
            session.destination.display()
        );
        Ok(session)
    }

    /// Running → Paused. Returns false (and broadcasts nothing) for any other
    /// state or an unknown id.
    pub async fn pause(&self, id: &str) -> bool {
        self.transition(id, SessionState::Running, SessionState::Paused).await
    }

    /// Paused → Running. Returns false (and broadcasts nothing) for any other
    /// state or an unknown id.
    pub async fn resume(&self, id: &str) -> bool {
        self.transition(id, SessionState::Paused, SessionState::Running).await
    }

    async fn transition(&self, id: &str, from: SessionState, to: SessionState) -> bool {
        let _toggle = self.toggles.lock().await;
        {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(id) {
                Some(session) if session.state == from => {
                    session.state = to;
                    session.gate.set_paused(to == SessionState::Paused);
                }
                Some(session) => {
                    debug!("Session {} is {}, ignoring {} request", id, session.state, to);
                    return false;
                }
                None => {
                    debug!("Unknown session {}, ignoring {} request", id, to);
                    return false;
                }
            }
        }

        info!("Session {} {}", id, to);
        let event = match to {
            SessionState::Paused => ProgressEvent::Paused {
                download_id: id.to_string(),
            },
            _ => ProgressEvent::Resumed {
                download_id: id.to_string(),
            },
        };
        self.bus.broadcast(&event).await;
        true
    }

    /// Marks the session completed and broadcasts `completed`.
    ///
    /// The event carries the title, taken from the output file name.
    /// Only the first terminal transition of a session is recorded; the event
    /// is broadcast on every call, including for unknown ids.
    pub async fn complete(&self, id: &str, path: &Path) {
        let recorded = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(id) {
                Some(session) if !session.state.is_terminal() => {
                    session.state = SessionState::Completed;
                    session.gate.set_paused(false);
                    session.output_path = Some(path.to_path_buf());
                    true
                }
                _ => false,
            }
        };

        if recorded {
            metrics::record_session_finished("completed");
            info!("Session {} completed: {}", id, path.display());
        } else {
            debug!("Session {} already finished or unknown, completion not recorded", id);
        }

        self.bus
            .broadcast(&ProgressEvent::Completed {
                title: path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.display().to_string(),
                download_id: id.to_string(),
            })
            .await;
    }

    /// Marks the session failed and broadcasts `error`.
    ///
    /// Same idempotency rules as [`SessionRegistry::complete`].
    pub async fn fail(&self, id: &str, error: &str) {
        let recorded = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get_mut(id) {
                Some(session) if !session.state.is_terminal() => {
                    session.state = SessionState::Failed;
                    session.gate.set_paused(false);
                    session.error = Some(error.to_string());
                    true
                }
                _ => false,
            }
        };

        if recorded {
            metrics::record_session_finished("failed");
            warn!("Session {} failed: {}", id, error);
        } else {
            debug!("Session {} already finished or unknown, failure not recorded", id);
        }

        self.bus
            .broadcast(&ProgressEvent::Error {
                error: error.to_string(),
                download_id: id.to_string(),
            })
            .await;
    }

    pub async fn status(&self, id: &str) -> Option<SessionState> {
        self.sessions.lock().await.get(id).map(|s| s.state)
    }

    /// Snapshot of a single session.
    pub async fn get(&self, id: &str) -> Option<DownloadSession> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Summaries of all sessions, newest first.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(DownloadSession::summary).collect();
        drop(sessions);
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.download_id.cmp(&b.download_id))
        });
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
