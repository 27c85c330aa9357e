//! Prefix-watch fan-out shared by both backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use orca_api::WatchEvent;

/// Buffered events per subscriber. A subscriber that falls behind loses
/// events rather than blocking store mutations.
const WATCH_BUFFER: usize = 64;

/// The receiving half of a watch subscription.
pub type WatchReceiver = mpsc::Receiver<WatchEvent>;

struct Watcher {
    id: u64,
    prefix: String,
    tx: mpsc::Sender<WatchEvent>,
}

/// Registry of active watch subscriptions.
pub(crate) struct WatchHub {
    watchers: Mutex<Vec<Watcher>>,
    next_id: AtomicU64,
}

impl WatchHub {
    pub(crate) fn new() -> Self {
        Self {
            watchers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(hub: &Arc<Self>, prefix: &str) -> (WatchReceiver, WatchHandle) {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let id = hub.next_id.fetch_add(1, Ordering::Relaxed);

        hub.watchers.lock().push(Watcher {
            id,
            prefix: prefix.to_string(),
            tx,
        });

        (
            rx,
            WatchHandle {
                id,
                hub: Arc::clone(hub),
            },
        )
    }

    /// Deliver an event to every subscriber whose prefix matches.
    pub(crate) fn notify(&self, event: WatchEvent) {
        let watchers = self.watchers.lock();
        for watcher in watchers.iter() {
            if !event.key.starts_with(&watcher.prefix) {
                continue;
            }
            if watcher.tx.try_send(event.clone()).is_err() {
                // Subscriber buffer full or receiver dropped: drop the
                // event. Watch delivery is best-effort by contract.
                trace!(key = %event.key, prefix = %watcher.prefix, "watch event dropped");
            }
        }
    }

    fn remove(&self, id: u64) {
        self.watchers.lock().retain(|w| w.id != id);
    }

    /// Drop every subscription, closing all streams.
    pub(crate) fn close(&self) {
        self.watchers.lock().clear();
    }
}

/// Cancel handle for a watch subscription. `cancel` is idempotent and
/// closes the stream promptly.
pub struct WatchHandle {
    id: u64,
    hub: Arc<WatchHub>,
}

impl WatchHandle {
    pub fn cancel(&self) {
        self.hub.remove(self.id);
    }
}
