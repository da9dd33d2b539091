//! Fan-out of progress events to every connected observer.
//!
//! Each observer owns the receiving half of a bounded channel. Broadcasting
//! serializes the event once and performs a non-blocking send per observer,
//! so a slow or dead observer never holds up the others or the producer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

use crate::core::{config, metrics};
use crate::download::events::ProgressEvent;

/// Opaque identifier of a subscribed observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// A freshly registered observer: its handle and the stream of serialized events.
#[derive(Debug)]
pub struct Subscription {
    pub handle: ObserverHandle,
    pub receiver: mpsc::Receiver<String>,
}

/// Broadcast channel for JSON progress events.
///
/// The observer map is the only shared state; the lock is held for the
/// duration of a single fan-out (or a single insert/remove), never across
/// network I/O.
pub struct ProgressBus {
    observers: Mutex<HashMap<ObserverHandle, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    observer_buffer: usize,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_observer_buffer(config::bus::OBSERVER_BUFFER)
    }

    /// Creates a bus whose observers may lag `observer_buffer` events behind
    /// before they start missing events.
    pub fn with_observer_buffer(observer_buffer: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            observer_buffer: observer_buffer.max(1),
        }
    }

    /// Registers a new observer.
    pub async fn subscribe(&self) -> Subscription {
        let handle = ObserverHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.observer_buffer);

        let mut observers = self.observers.lock().await;
        observers.insert(handle, tx);
        metrics::set_observer_count(observers.len());
        log::debug!("Observer {:?} subscribed ({} connected)", handle, observers.len());

        Subscription { handle, receiver: rx }
    }

    /// Removes an observer. Returns false if it was already gone.
    pub async fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let mut observers = self.observers.lock().await;
        let removed = observers.remove(&handle).is_some();
        if removed {
            metrics::set_observer_count(observers.len());
            log::debug!("Observer {:?} unsubscribed ({} connected)", handle, observers.len());
        }
        removed
    }

    /// Number of currently subscribed observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Delivers `event` to every subscribed observer.
    ///
    /// Observers whose receiver is gone are unsubscribed on the spot; observers
    /// whose buffer is full miss this event. Returns the number of observers
    /// the event was delivered to.
    pub async fn broadcast(&self, event: &ProgressEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize {} event: {}", event.status(), e);
                return 0;
            }
        };

        let mut observers = self.observers.lock().await;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (handle, tx) in observers.iter() {
            match tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "Observer {:?} is lagging, dropping {} event",
                        handle,
                        event.status()
                    );
                    metrics::record_dropped_event("observer_full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*handle),
            }
        }

        if !closed.is_empty() {
            for handle in &closed {
                observers.remove(handle);
            }
            metrics::set_observer_count(observers.len());
            log::debug!("Removed {} disconnected observer(s)", closed.len());
        }

        delivered
    }
}
