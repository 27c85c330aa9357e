//! Rate-limited, deduplicating work queue with exponential backoff.
//!
//! The queue guarantees three properties:
//!
//! 1. At most one entry per key is queued at any moment.
//! 2. An event arriving for a key that is currently being processed marks
//!    it dirty; `done` re-enqueues it exactly once. The latest event for a
//!    key is therefore always eventually processed.
//! 3. `requeue` re-adds a key with exponential delay
//!    `min(60s, 1s * 2^(attempts-1))`; attempts accumulate across requeues
//!    of the same key and reset once it completes cleanly.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

struct WorkItem {
    key: String,
    next_retry: Instant,
}

#[derive(Default)]
struct QueueState {
    items: Vec<WorkItem>,
    /// Keys queued or needing re-queue after processing.
    dirty: HashSet<String>,
    /// Keys currently handed out to a worker.
    processing: HashSet<String>,
    /// Consecutive failures per key; drives the backoff exponent.
    attempts: HashMap<String, u32>,
    closed: bool,
}

/// A per-controller work queue.
pub struct WorkQueue {
    state: Mutex<QueueState>,
    // Coalescing wakeup: multiple signals collapse into one stored permit,
    // and signalling never blocks the producer.
    notify: Notify,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue a key. A key already queued or being processed is not
    /// duplicated; a processing key is re-queued by `done` instead.
    pub fn add(&self, key: &str) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.dirty.insert(key.to_string());

        if state.processing.contains(key) {
            return;
        }
        if state.items.iter().any(|item| item.key == key) {
            return;
        }

        state.items.push(WorkItem {
            key: key.to_string(),
            next_retry: Instant::now(),
        });
        drop(state);
        self.notify.notify_one();
    }

    /// Return the next ready key, blocking until one is available. Returns
    /// `None` once the queue is closed and drained.
    pub async fn get(&self) -> Option<String> {
        loop {
            let sleep_until = {
                let mut state = self.state.lock();

                if state.closed && state.items.is_empty() {
                    return None;
                }

                let now = Instant::now();
                if let Some(pos) = state.items.iter().position(|item| item.next_retry <= now) {
                    let item = state.items.remove(pos);
                    // Clear the dirty mark: only an add() arriving while the
                    // key is processing should trigger a re-queue on done().
                    state.dirty.remove(&item.key);
                    state.processing.insert(item.key.clone());
                    return Some(item.key);
                }

                state.items.iter().map(|item| item.next_retry).min()
            };

            let notified = self.notify.notified();
            match sleep_until {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Mark a key as processed. If a new event arrived for it during
    /// processing, it is re-queued immediately with a fresh attempt count.
    pub fn done(&self, key: &str) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        state.attempts.remove(key);

        if state.dirty.contains(key) && !state.closed {
            // An event arrived while this key was processing: re-queue it
            // once, with a fresh attempt count.
            state.items.push(WorkItem {
                key: key.to_string(),
                next_retry: Instant::now(),
            });
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Re-queue a failed key with exponential backoff.
    pub fn requeue(&self, key: &str) {
        let mut state = self.state.lock();
        if state.closed {
            state.processing.remove(key);
            return;
        }

        let attempts = state.attempts.entry(key.to_string()).or_insert(0);
        *attempts += 1;
        let backoff = backoff_for_attempt(*attempts);

        state.processing.remove(key);
        state.dirty.insert(key.to_string());
        state.items.push(WorkItem {
            key: key.to_string(),
            next_retry: Instant::now() + backoff,
        });
        drop(state);
        self.notify.notify_one();
    }

    /// Number of queued (not in-flight) keys.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down the queue, unblocking all `get` callers.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.items.clear();
        drop(state);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }
}

fn backoff_for_attempt(attempts: u32) -> Duration {
    let exp = attempts.saturating_sub(1).min(6); // 2^6 s already exceeds the cap
    let backoff = INITIAL_BACKOFF * 2u32.pow(exp);
    backoff.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(6), Duration::from_secs(32));
        assert_eq!(backoff_for_attempt(7), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(50), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn add_get_done_cycle() {
        let queue = WorkQueue::new();
        queue.add("/AgentPod/p/a");

        let key = queue.get().await.expect("key");
        assert_eq!(key, "/AgentPod/p/a");
        assert!(queue.is_empty());

        queue.done(&key);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn duplicate_adds_coalesce() {
        let queue = WorkQueue::new();
        queue.add("k");
        queue.add("k");
        queue.add("k");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn add_during_processing_requeues_on_done() {
        let queue = WorkQueue::new();
        queue.add("k");
        let key = queue.get().await.expect("key");

        // Event arrives while the key is being processed.
        queue.add("k");
        assert!(queue.is_empty(), "key must not be queued while processing");

        queue.done(&key);
        assert_eq!(queue.len(), 1, "dirty key is re-queued exactly once");

        let key = queue.get().await.expect("key");
        queue.done(&key);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn requeue_applies_backoff() {
        let queue = WorkQueue::new();
        queue.add("k");

        let key = queue.get().await.expect("key");
        queue.requeue(&key);

        // Not ready before the 1s backoff elapses; paused time auto-advances
        // to the sleep deadline inside get().
        let started = Instant::now();
        let key = queue.get().await.expect("key");
        assert!(started.elapsed() >= Duration::from_secs(1));

        // Second consecutive failure backs off for 2s.
        queue.requeue(&key);
        let started = Instant::now();
        let key = queue.get().await.expect("key");
        assert!(started.elapsed() >= Duration::from_secs(2));

        queue.done(&key);
    }

    #[tokio::test]
    async fn close_unblocks_get() {
        let queue = std::sync::Arc::new(WorkQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        // Give the waiter a chance to block.
        tokio::task::yield_now().await;
        queue.close();

        let got = waiter.await.expect("join");
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn add_after_close_is_ignored() {
        let queue = WorkQueue::new();
        queue.close();
        queue.add("k");
        assert!(queue.get().await.is_none());
    }
}
