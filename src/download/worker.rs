//! Background execution of download sessions.
//!
//! A [`WorkerPool`] bounds how many transfers run at once. Each session gets a
//! [`DownloadWorker`] that runs the blocking fetch on tokio's blocking pool and
//! relays its progress to the [`ProgressBus`] through a bounded channel drained
//! by a single forwarder task, which keeps the events of a session in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::metrics;
use crate::core::utils::format_filesize;
use crate::download::bus::ProgressBus;
use crate::download::events::ProgressEvent;
use crate::download::fetcher::{FetchRequest, FetchedMedia, MediaFetcher, RawProgress};
use crate::download::registry::SessionRegistry;
use crate::download::session::{DownloadSession, PauseGate};

/// Runs download sessions in the background, at most `size` at a time.
pub struct WorkerPool {
    fetcher: Arc<dyn MediaFetcher>,
    registry: Arc<SessionRegistry>,
    permits: Arc<Semaphore>,
    size: usize,
    handoff_timeout: Duration,
}

impl WorkerPool {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, registry: Arc<SessionRegistry>, size: usize) -> Self {
        let size = size.max(1);
        Self {
            fetcher,
            registry,
            permits: Arc::new(Semaphore::new(size)),
            size,
            handoff_timeout: config::worker::handoff_timeout(),
        }
    }

    /// Overrides how long a progress event may wait for buffer space.
    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Worker slots not currently held by a transfer.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn fetcher(&self) -> &Arc<dyn MediaFetcher> {
        &self.fetcher
    }

    /// Starts a worker for `session` and returns immediately.
    ///
    /// The worker waits for a free slot before it touches the network. Its
    /// outcome is reported through the registry (and thus the bus), never to
    /// the caller; the handle is only useful for tests and shutdown.
    pub fn spawn(&self, session: DownloadSession) -> JoinHandle<()> {
        let worker = DownloadWorker {
            fetcher: self.fetcher.clone(),
            bus: self.registry.bus().clone(),
            handoff_timeout: self.handoff_timeout,
            session,
        };
        let registry = self.registry.clone();
        let permits = self.permits.clone();

        metrics::QUEUED_WORKERS.inc();
        tokio::spawn(async move {
            let id = worker.session.id.clone();
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    metrics::QUEUED_WORKERS.dec();
                    registry.fail(&id, "Worker pool is shut down").await;
                    return;
                }
            };
            metrics::QUEUED_WORKERS.dec();
            metrics::ACTIVE_WORKERS.inc();
            log::info!("Worker started for session {}", id);

            let outcome = worker.run().await;
            metrics::ACTIVE_WORKERS.dec();

            match outcome {
                Ok(path) => registry.complete(&id, &path).await,
                Err(e) => registry.fail(&id, &e.to_string()).await,
            }
        })
    }
}

/// Drives one session from setup to a verified output file.
pub struct DownloadWorker {
    fetcher: Arc<dyn MediaFetcher>,
    bus: Arc<ProgressBus>,
    handoff_timeout: Duration,
    session: DownloadSession,
}

impl DownloadWorker {
    /// Runs the transfer and returns the path of the verified output.
    ///
    /// Partial files are left where the fetcher wrote them on failure.
    pub async fn run(self) -> Result<PathBuf, AppError> {
        let DownloadWorker {
            fetcher,
            bus,
            handoff_timeout,
            session,
        } = self;

        tokio::fs::create_dir_all(&session.destination).await.map_err(|e| {
            AppError::PreconditionFailed(format!(
                "Cannot create download directory {}: {}",
                session.destination.display(),
                e
            ))
        })?;
        fetcher.check_tools().await?;

        let (tx, rx) = mpsc::channel::<ProgressEvent>(config::worker::EVENT_BUFFER);
        let forwarder = tokio::spawn(forward_events(rx, bus, session.gate.clone()));

        let request = FetchRequest {
            url: session.url.clone(),
            format_selector: session.format_selector.clone(),
            destination: session.destination.clone(),
        };
        let reporter = ProgressReporter {
            download_id: session.id.clone(),
            gate: session.gate.clone(),
            tx,
            handle: Handle::current(),
            timeout: handoff_timeout,
        };

        let fetched = tokio::task::spawn_blocking(move || {
            let mut reporter = reporter;
            fetcher.fetch(&request, &mut |raw| reporter.report(raw))
        })
        .await;

        // The reporter (and its sender) is gone once the blocking task ends,
        // so the forwarder drains what is left and exits.
        if let Err(e) = forwarder.await {
            log::warn!("Progress forwarder for session {} ended abnormally: {}", session.id, e);
        }

        let media = match fetched {
            Ok(result) => result?,
            Err(e) if e.is_panic() => {
                log::error!("Fetcher panicked for session {}", session.id);
                return Err(AppError::Transfer("Worker panicked".to_string()));
            }
            Err(e) => return Err(AppError::Transfer(format!("Worker was cancelled: {}", e))),
        };

        verify_output(&session.destination, &media).await
    }
}

/// Drains a worker's event channel onto the bus in order.
///
/// `downloading` events still queued when the session gets paused are
/// dropped here, so they do not trail the `paused` event.
async fn forward_events(mut rx: mpsc::Receiver<ProgressEvent>, bus: Arc<ProgressBus>, gate: PauseGate) {
    while let Some(event) = rx.recv().await {
        if gate.is_paused() && matches!(event, ProgressEvent::Downloading { .. }) {
            continue;
        }
        bus.broadcast(&event).await;
    }
}

/// Converts raw fetcher callbacks into events and hands them to the forwarder.
///
/// Lives on the blocking thread; every send waits at most `timeout` for buffer
/// space, after which the event is dropped and the transfer continues.
struct ProgressReporter {
    download_id: String,
    gate: PauseGate,
    tx: mpsc::Sender<ProgressEvent>,
    handle: Handle,
    timeout: Duration,
}

impl ProgressReporter {
    fn report(&mut self, raw: RawProgress) {
        let event = match raw {
            RawProgress::Downloading {
                downloaded,
                total,
                speed,
                eta,
                filename,
            } => {
                if self.gate.is_paused() {
                    return;
                }
                ProgressEvent::downloading(&self.download_id, downloaded, total, speed, eta, filename)
            }
            RawProgress::Finished { .. } => ProgressEvent::converting(&self.download_id),
        };

        match self.handle.block_on(self.tx.send_timeout(event, self.timeout)) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(event)) => {
                log::warn!(
                    "Progress hand-off timed out after {:?} for session {}, dropping {} event",
                    self.timeout,
                    self.download_id,
                    event.status()
                );
                metrics::record_dropped_event("handoff_timeout");
            }
            Err(SendTimeoutError::Closed(event)) => {
                log::warn!(
                    "Progress forwarder for session {} is gone, dropping {} event",
                    self.download_id,
                    event.status()
                );
                metrics::record_dropped_event("handoff_closed");
            }
        }
    }
}

/// Locates the produced file and checks it is not empty.
///
/// Prefers the converted `<stem>.mp4`, then the file under its original
/// extension.
pub async fn verify_output(dir: &Path, media: &FetchedMedia) -> Result<PathBuf, AppError> {
    let converted = dir.join(format!("{}.{}", media.stem, config::ytdlp::OUTPUT_CONTAINER));
    let original = dir.join(format!("{}.{}", media.stem, media.ext));

    let path = if tokio::fs::try_exists(&converted).await.unwrap_or(false) {
        converted
    } else if tokio::fs::try_exists(&original).await.unwrap_or(false) {
        original
    } else {
        return Err(AppError::Transfer(format!("File not found in {}", dir.display())));
    };

    let size = tokio::fs::metadata(&path).await?.len();
    if size == 0 {
        return Err(AppError::Transfer("File is empty (0 bytes)".to_string()));
    }

    log::info!("Download verified: {} ({})", path.display(), format_filesize(size));
    Ok(path)
}
