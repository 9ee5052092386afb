//! Keyed, versioned task queue.
//!
//! Sync work is naturally keyed by path: two pulls of the same path are
//! redundant, and two writers under the same path must not interleave.
//! The queue encodes both rules. Each task carries a version; enqueueing
//! a key that is already queued replaces the pending task when the
//! version changed and is dropped when it did not. Running tasks are
//! never preempted, and work for one key never runs concurrently with
//! itself. A request arriving while its key runs queues behind the
//! in-flight task, so a retry after a failed run is never lost.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

type Work = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

// Workers re-check the queue at least this often, so a missed wakeup
// costs latency, never liveness.
const WORKER_POLL: Duration = Duration::from_millis(25);

struct State<V> {
    order: VecDeque<String>,
    queued: HashMap<String, (V, Work)>,
    running: HashSet<String>,
    stopped: bool,
}

struct Shared<V> {
    state: Mutex<State<V>>,
    wake: Notify,
}

/// A concurrency-bounded queue of keyed, versioned tasks.
pub struct TaskQueue<V> {
    shared: Arc<Shared<V>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<V> TaskQueue<V>
where
    V: PartialEq + Send + 'static,
{
    /// Create a stopped queue. Call [`TaskQueue::start`] to run tasks.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    order: VecDeque::new(),
                    queued: HashMap::new(),
                    running: HashSet::new(),
                    stopped: true,
                }),
                wake: Notify::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Queue `work` under `key` at `version`.
    ///
    /// If the key is already queued, an equal version coalesces (the
    /// new task is dropped) and a different version supersedes (the
    /// pending task is dropped). A key that is currently running never
    /// coalesces the new request; it queues behind the in-flight task,
    /// since that task may be failing right now and the follow-up run
    /// is the retry.
    pub fn enqueue<F>(&self, key: impl Into<String>, version: V, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let mut state = self.shared.state.lock().unwrap();
        match state.queued.get(&key) {
            Some((queued_version, _)) if *queued_version == version => {
                debug!(%key, "coalesced with queued task");
            }
            Some(_) => {
                debug!(%key, "superseding queued task");
                state.queued.insert(key, (version, Box::pin(work)));
            }
            None => {
                state.order.push_back(key.clone());
                state.queued.insert(key, (version, Box::pin(work)));
            }
        }
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Spawn `max_concurrency` workers. No-op if already started.
    pub fn start(&self, max_concurrency: usize) {
        let mut workers = self.workers.lock().unwrap();
        if !workers.is_empty() {
            return;
        }
        self.shared.state.lock().unwrap().stopped = false;
        for _ in 0..max_concurrency.max(1) {
            let shared = self.shared.clone();
            workers.push(tokio::spawn(run_worker(shared)));
        }
    }

    /// Stop dequeuing and wait for in-flight tasks to finish.
    ///
    /// Already-queued tasks stay queued and run on the next
    /// [`TaskQueue::start`]. Idempotent.
    pub async fn stop(&self) {
        self.shared.state.lock().unwrap().stopped = true;
        self.shared.wake.notify_waiters();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            // A worker that panicked is already gone; nothing to drain.
            let _ = worker.await;
        }
    }

    /// Whether nothing is queued and nothing is running.
    pub fn is_empty(&self) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.queued.is_empty() && state.running.is_empty()
    }
}

impl<V> Default for TaskQueue<V>
where
    V: PartialEq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker<V: Send + 'static>(shared: Arc<Shared<V>>) {
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap();
            if state.stopped {
                break;
            }
            // First queued key whose work is not already in flight.
            let slot = state
                .order
                .iter()
                .position(|key| !state.running.contains(key));
            match slot {
                Some(index) => {
                    let key = state.order.remove(index).unwrap();
                    let (_, work) = state.queued.remove(&key).unwrap();
                    state.running.insert(key.clone());
                    Some((key, work))
                }
                None => None,
            }
        };

        match job {
            Some((key, work)) => {
                work.await;
                shared.state.lock().unwrap().running.remove(&key);
                shared.wake.notify_one();
            }
            None => {
                let _ = tokio::time::timeout(WORKER_POLL, shared.wake.notified()).await;
            }
        }
    }
}
