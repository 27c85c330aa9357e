//! Controller runtime: wires store watches to work queues and runs the
//! worker loops that call reconcilers.

mod agent_pool;
mod dev_task;
mod health;
pub mod queue;

pub use agent_pool::AgentPoolController;
pub use dev_task::DevTaskController;
pub use health::HealthController;
pub use queue::WorkQueue;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use orca_api::kind_prefix;
use orca_store::{Store, WatchHandle, WatchReceiver};

/// Processes a single resource key, reading current state from the store
/// and writing adjustments toward the declared state. Returning an error
/// requests a retry with backoff.
///
/// A reconciler may receive keys of kinds other than its primary kind; it
/// must inspect the key's kind prefix and dispatch accordingly.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, key: &str) -> anyhow::Result<()>;
}

struct Registration {
    name: &'static str,
    reconciler: Arc<dyn Reconcile>,
    watch_kinds: Vec<&'static str>,
    queue: Arc<WorkQueue>,
}

/// Coordinates the registered controllers: one watch feeder per watched
/// kind and exactly one worker loop per controller.
pub struct Manager {
    store: Arc<Store>,
    registrations: Vec<Registration>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    watch_handles: Vec<WatchHandle>,
}

impl Manager {
    pub fn new(store: Arc<Store>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            registrations: Vec::new(),
            shutdown,
            tasks: Vec::new(),
            watch_handles: Vec::new(),
        }
    }

    /// Register a controller that watches the given resource kinds.
    pub fn register(
        &mut self,
        name: &'static str,
        reconciler: Arc<dyn Reconcile>,
        watch_kinds: Vec<&'static str>,
    ) {
        self.registrations.push(Registration {
            name,
            reconciler,
            watch_kinds,
            queue: Arc::new(WorkQueue::new()),
        });
    }

    /// Start every controller: open the watches, spawn the feeders and the
    /// worker loops.
    pub fn start(&mut self) {
        for registration in &self.registrations {
            info!(
                controller = registration.name,
                kinds = ?registration.watch_kinds,
                "starting controller"
            );

            for kind in &registration.watch_kinds {
                let (events, handle) = self.store.watch(&kind_prefix(kind));
                self.watch_handles.push(handle);
                self.tasks.push(tokio::spawn(watch_loop(
                    registration.name,
                    events,
                    registration.queue.clone(),
                    self.shutdown.subscribe(),
                )));
            }

            self.tasks.push(tokio::spawn(worker_loop(
                registration.name,
                registration.reconciler.clone(),
                registration.queue.clone(),
            )));
        }
    }

    /// Stop all controllers: cancel watches, close queues, and wait for
    /// the loops to exit.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for handle in self.watch_handles.drain(..) {
            handle.cancel();
        }
        for registration in &self.registrations {
            registration.queue.close();
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("controller manager stopped");
    }
}

/// Feed watch events into the controller's work queue until shutdown or
/// the watch stream closes.
async fn watch_loop(
    controller: &'static str,
    mut events: WatchReceiver,
    queue: Arc<WorkQueue>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return;
                };
                debug!(
                    controller,
                    event_type = %event.event_type,
                    key = %event.key,
                    "watch event received"
                );
                queue.add(&event.key);
            }
        }
    }
}

/// Drain the work queue, calling the reconciler for each key. Errors
/// trigger a requeue with backoff; clean completions release the key.
async fn worker_loop(
    controller: &'static str,
    reconciler: Arc<dyn Reconcile>,
    queue: Arc<WorkQueue>,
) {
    while let Some(key) = queue.get().await {
        debug!(controller, key = %key, "reconciling");
        match reconciler.reconcile(&key).await {
            Ok(()) => queue.done(&key),
            Err(err) => {
                error!(controller, key = %key, error = %err, "reconcile failed");
                queue.requeue(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use orca_api::{resource_key, Project, KIND_PROJECT};

    struct CountingReconciler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reconcile for CountingReconciler {
        async fn reconcile(&self, _key: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_the_reconciler() {
        let store = Arc::new(Store::in_memory());
        let reconciler = Arc::new(CountingReconciler {
            calls: AtomicUsize::new(0),
        });

        let mut manager = Manager::new(store.clone());
        manager.register("TestController", reconciler.clone(), vec![KIND_PROJECT]);
        manager.start();

        let project = Project {
            metadata: orca_api::ObjectMeta {
                name: "demo".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        store
            .create(&resource_key(KIND_PROJECT, "", "demo"), &project)
            .expect("create");

        // Wait for the event to flow through feeder and worker.
        for _ in 0..100 {
            if reconciler.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(reconciler.calls.load(Ordering::SeqCst) >= 1);

        manager.stop().await;
    }
}
