//! Deduplicating work queue with per-key single-flight.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

struct QueueState<I> {
    queue: VecDeque<I>,
    /// Ids waiting in `queue`.
    queued: HashSet<I>,
    /// Ids handed out by `get` and not yet `done`.
    processing: HashSet<I>,
    /// Ids added while processing; re-queued on `done`.
    dirty: HashSet<I>,
    /// Consecutive failures per id, for backoff.
    failures: HashMap<I, u32>,
    shutting_down: bool,
}

/// A queue of ids to reconcile.
///
/// - An id is queued at most once at a time.
/// - An id handed out by [`get`](Self::get) is not handed out again until
///   [`done`](Self::done) is called for it. Adds in between are remembered
///   and the id is re-queued by `done`.
pub struct WorkQueue<I> {
    state: Mutex<QueueState<I>>,
    notify: Notify,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl<I> WorkQueue<I>
where
    I: Clone + Eq + Hash + Send + 'static,
{
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                queued: HashSet::new(),
                processing: HashSet::new(),
                dirty: HashSet::new(),
                failures: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            initial_backoff,
            max_backoff,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<I>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `id` unless it is already queued.
    pub fn add(&self, id: I) {
        let mut state = self.lock();
        if state.shutting_down {
            return;
        }
        if state.processing.contains(&id) {
            state.dirty.insert(id);
            return;
        }
        if state.queued.insert(id.clone()) {
            state.queue.push_back(id);
            self.notify.notify_one();
        }
    }

    /// Waits for the next id. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<I> {
        loop {
            let mut notified = std::pin::pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(id) = state.queue.pop_front() {
                    state.queued.remove(&id);
                    state.processing.insert(id.clone());
                    return Some(id);
                }
            }
            notified.await;
        }
    }

    /// Marks `id` as finished, re-queueing it if it was added meanwhile.
    pub fn done(&self, id: &I) {
        let mut state = self.lock();
        state.processing.remove(id);
        if state.dirty.remove(id) && !state.shutting_down && state.queued.insert(id.clone()) {
            state.queue.push_back(id.clone());
            self.notify.notify_one();
        }
    }

    /// Queues `id` after a delay that doubles with each consecutive failure.
    /// Returns the delay.
    pub fn add_rate_limited(self: &Arc<Self>, id: I) -> Duration {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(id.clone()).or_insert(0);
            let delay = backoff(self.initial_backoff, self.max_backoff, *failures);
            *failures = failures.saturating_add(1);
            delay
        };
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(id);
        });
        delay
    }

    /// Clears the failure count of `id`.
    pub fn forget(&self, id: &I) {
        self.lock().failures.remove(id);
    }

    /// Number of consecutive failures recorded for `id`.
    pub fn failures(&self, id: &I) -> u32 {
        self.lock().failures.get(id).copied().unwrap_or(0)
    }

    /// Number of ids waiting to be handed out.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops handing out ids and wakes every waiting `get`.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}

fn backoff(initial: Duration, max: Duration, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
    initial.saturating_mul(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let initial = Duration::from_millis(10);
        let max = Duration::from_secs(5);
        assert_eq!(backoff(initial, max, 0), Duration::from_millis(10));
        assert_eq!(backoff(initial, max, 1), Duration::from_millis(20));
        assert_eq!(backoff(initial, max, 3), Duration::from_millis(80));
        assert_eq!(backoff(initial, max, 20), max);
        assert_eq!(backoff(initial, max, 40), max);
    }
}
