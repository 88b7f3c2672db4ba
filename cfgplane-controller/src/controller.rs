//! Watch-driven reconcile loop.
//!
//! A [`Controller`] connects one or more [`Watcher`]s to a [`Reconciler`]:
//!
//! ```text
//! store events ─▶ Watcher ─▶ channel ─▶ dispatcher ─▶ WorkQueue ─▶ workers ─▶ Reconciler
//! ```
//!
//! The work queue guarantees at most one reconcile in flight per id while
//! different ids run in parallel across the worker pool. Failed passes are
//! retried with exponential backoff; the reconciler itself never retries.

use crate::error::ControllerResult;
use crate::queue::WorkQueue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Turns store change events into ids to reconcile.
#[async_trait]
pub trait Watcher<I>: Send + Sync {
    /// Starts forwarding ids on `tx`. Returns once the subscription is open;
    /// forwarding continues in a background task.
    async fn start(&self, tx: mpsc::Sender<I>) -> ControllerResult<()>;
}

/// Drives one object one step towards its desired state.
#[async_trait]
pub trait Reconciler<I>: Send + Sync {
    async fn reconcile(&self, id: I) -> ControllerResult<ReconcileResult>;
}

/// Outcome of a successful reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Run another pass for the same id right away.
    pub requeue: bool,
}

impl ReconcileResult {
    #[must_use]
    pub fn done() -> Self {
        Self { requeue: false }
    }

    #[must_use]
    pub fn requeue() -> Self {
        Self { requeue: true }
    }
}

/// Configuration for a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers.
    pub workers: usize,
    /// Capacity of the watcher delivery channel.
    pub channel_capacity: usize,
    /// Backoff after the first failed pass for an id (ms).
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry backoff (ms).
    pub max_backoff_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_capacity: 1024,
            initial_backoff_ms: 10,
            max_backoff_ms: 5_000,
        }
    }
}

pub struct Controller<I> {
    name: String,
    config: ControllerConfig,
    watchers: Vec<Arc<dyn Watcher<I>>>,
    reconciler: Arc<dyn Reconciler<I>>,
    queue: Arc<WorkQueue<I>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<I> Controller<I>
where
    I: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        config: ControllerConfig,
        reconciler: Arc<dyn Reconciler<I>>,
    ) -> Self {
        let queue = WorkQueue::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        );
        Self {
            name: name.into(),
            config,
            watchers: Vec::new(),
            reconciler,
            queue: Arc::new(queue),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Adds a watcher. Watchers are started by [`start`](Self::start).
    pub fn watch(&mut self, watcher: Arc<dyn Watcher<I>>) -> &mut Self {
        self.watchers.push(watcher);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue<I>> {
        &self.queue
    }

    /// Queues `id` for reconciliation outside of any watcher.
    pub fn enqueue(&self, id: I) {
        self.queue.add(id);
    }

    /// Starts the dispatcher, the worker pool and then the watchers.
    ///
    /// The channel is drained before any watcher subscribes, so a replay
    /// larger than `channel_capacity` never blocks `start`.
    pub async fn start(&self) -> ControllerResult<()> {
        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut tasks = Vec::with_capacity(self.config.workers + 1);

        let queue = Arc::clone(&self.queue);
        let name = self.name.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(id) = rx.recv().await {
                queue.add(id);
            }
            debug!(controller = %name, "Watch channel closed");
        }));

        let workers = self.config.workers.max(1);
        for worker in 0..workers {
            tasks.push(tokio::spawn(run_worker(
                self.name.clone(),
                worker,
                Arc::clone(&self.queue),
                Arc::clone(&self.reconciler),
            )));
        }

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tasks);

        for watcher in &self.watchers {
            watcher.start(tx.clone()).await?;
        }
        drop(tx);

        info!(controller = %self.name, workers, watchers = self.watchers.len(), "Controller started");
        Ok(())
    }

    /// Shuts the queue down and waits for the workers to finish their
    /// current pass. Watcher tasks are left to the process lifecycle.
    pub async fn stop(&self) {
        self.queue.shut_down();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut tasks = tasks.into_iter();
        // The first task is the dispatcher, which only ends when every
        // watcher hangs up.
        if let Some(dispatcher) = tasks.next() {
            dispatcher.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        info!(controller = %self.name, "Controller stopped");
    }
}

async fn run_worker<I>(
    name: String,
    worker: usize,
    queue: Arc<WorkQueue<I>>,
    reconciler: Arc<dyn Reconciler<I>>,
) where
    I: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    while let Some(id) = queue.get().await {
        debug!(controller = %name, worker, id = %id, "Reconciling");
        match reconciler.reconcile(id.clone()).await {
            Ok(result) => {
                queue.forget(&id);
                if result.requeue {
                    queue.add(id.clone());
                }
            }
            Err(e) => {
                let delay = queue.add_rate_limited(id.clone());
                warn!(
                    controller = %name,
                    id = %id,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Reconcile failed"
                );
            }
        }
        queue.done(&id);
    }
    debug!(controller = %name, worker, "Worker exiting");
}
