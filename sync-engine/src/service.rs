//! The sync orchestration service.
//!
//! Wires a [`Reconciler`] to two task queues (pulls and pushes), the
//! backing's mutation events, an optional remote notification source,
//! and a periodic sweep. All entry points are enqueue-and-forget: sync
//! work never returns errors to callers, failures surface as `tracing`
//! diagnostics and are retried by the next sweep.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sync_store::BackingEvent;
use sync_types::{Glob, ItemHash, RemoteId, SyncablePath};

use crate::notify::{ChangeNotifications, ContentChange};
use crate::queue::TaskQueue;
use crate::reconcile::Reconciler;

/// A request to pull `path` from the remotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// What to pull.
    pub path: SyncablePath,
    /// The hash that prompted the request, when known. Requests for an
    /// unchanged hash coalesce in the queue.
    pub hash: Option<ItemHash>,
}

/// A request to push `path` to the remotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    /// What to push.
    pub path: SyncablePath,
    /// The local hash being pushed.
    pub hash: ItemHash,
}

/// Tuning knobs for the service.
#[derive(Debug, Clone)]
pub struct SyncServiceConfig {
    /// How often the full-tree sweep runs. The first sweep fires
    /// immediately on start.
    pub sweep_interval: Duration,
    /// Scope of sync traversals.
    pub glob: Glob,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            glob: Glob::all(),
        }
    }
}

// Queue version: which remote prompted the work (None = all) and the
// hash it advertised (None = unknown, always re-run).
type TaskVersion = (Option<RemoteId>, Option<ItemHash>);

struct Inner {
    reconciler: Arc<Reconciler>,
    config: SyncServiceConfig,
    pulls: TaskQueue<TaskVersion>,
    pushes: TaskQueue<TaskVersion>,
}

impl Inner {
    /// The local hash at `path`, or `None` when absent.
    async fn local_hash(&self, path: &SyncablePath) -> Option<ItemHash> {
        self.reconciler
            .backing
            .get_metadata_at_path(path)
            .await
            .ok()
            .map(|metadata| metadata.hash)
    }
}

fn enqueue_pull(
    inner: &Arc<Inner>,
    remote_id: Option<RemoteId>,
    path: SyncablePath,
    hash: Option<ItemHash>,
) {
    let key = path.to_string();
    let version = (remote_id.clone(), hash);
    let task = inner.clone();
    inner.pulls.enqueue(key, version, async move {
        let inner = task;
        let held = inner.reconciler.new_chain();
        let glob = &inner.config.glob;
        let outcome = match &remote_id {
            Some(remote_id) => {
                inner
                    .reconciler
                    .pull_from_remote(&held, remote_id, &path, glob)
                    .await
            }
            None => inner.reconciler.pull_from_remotes(&held, &path, glob).await,
        };
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(%path, "nothing to pull yet");
            }
            Err(err) => warn!(%path, error = %err, "pull failed"),
        }
    });
}

fn enqueue_push(inner: &Arc<Inner>, path: SyncablePath, hash: Option<ItemHash>) {
    let key = path.to_string();
    let task = inner.clone();
    inner.pushes.enqueue(key, (None, hash), async move {
        let inner = task;
        let glob = &inner.config.glob;
        match inner.reconciler.push_to_remotes(&path, glob).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(%path, "nothing to push");
            }
            Err(err) => warn!(%path, error = %err, "push failed"),
        }
    });
}

/// Keeps a backing continuously reconciled with its remotes.
///
/// Owns the queues and listener tasks between [`SyncService::start`] and
/// [`SyncService::stop`]. Dropping a started service aborts its
/// listeners but does not drain in-flight work; call `stop` for that.
pub struct SyncService {
    inner: Arc<Inner>,
    notifications: Option<Arc<dyn ChangeNotifications>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncService {
    /// Create a stopped service.
    pub fn new(
        reconciler: Arc<Reconciler>,
        notifications: Option<Arc<dyn ChangeNotifications>>,
        config: SyncServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reconciler,
                config,
                pulls: TaskQueue::new(),
                pushes: TaskQueue::new(),
            }),
            notifications,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Request a pull of `path` from the remotes. Never fails; the
    /// outcome surfaces only in diagnostics.
    pub fn pull_from_remotes(&self, request: PullRequest) {
        enqueue_pull(&self.inner, None, request.path, request.hash);
    }

    /// Request a push of `path` to the remotes. Never fails; the
    /// outcome surfaces only in diagnostics.
    pub fn push_to_remotes(&self, request: PushRequest) {
        enqueue_push(&self.inner, request.path, Some(request.hash));
    }

    /// Whether both queues are idle.
    pub fn is_idle(&self) -> bool {
        self.inner.pulls.is_empty() && self.inner.pushes.is_empty()
    }

    /// Start the queues, listeners and sweep. No-op if already started.
    pub fn start(&self, max_pull_concurrency: usize, max_push_concurrency: usize) {
        let mut listeners = self.listeners.lock().unwrap();
        if !listeners.is_empty() {
            return;
        }
        info!("starting sync service");
        self.inner.pulls.start(max_pull_concurrency);
        self.inner.pushes.start(max_push_concurrency);

        listeners.push(tokio::spawn(listen_backing(self.inner.clone())));
        if let Some(notifications) = &self.notifications {
            listeners.push(tokio::spawn(listen_notifications(
                self.inner.clone(),
                notifications.subscribe(),
            )));
        }
        listeners.push(tokio::spawn(sweep(self.inner.clone())));
    }

    /// Stop listeners and drain in-flight work. Idempotent.
    pub async fn stop(&self) {
        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap());
        if !listeners.is_empty() {
            info!("stopping sync service");
        }
        for listener in listeners {
            listener.abort();
            let _ = listener.await;
        }
        self.inner.pulls.stop().await;
        self.inner.pushes.stop().await;
    }
}

/// React to local mutations: new folders get pulled into scope
/// immediately, new or changed items get pushed out. Folder removals
/// need no action of their own; the single backing subscription covers
/// the whole tree, and the parent's changed hash travels with the next
/// push of the parent.
async fn listen_backing(inner: Arc<Inner>) {
    let mut events = inner.reconciler.backing.subscribe();
    loop {
        match events.recv().await {
            Ok(BackingEvent::FolderAdded(path)) => {
                let hash = inner.local_hash(&path).await;
                enqueue_pull(&inner, None, path.clone(), hash);
                enqueue_push(&inner, path, hash);
            }
            Ok(BackingEvent::ItemAdded(path)) => {
                let hash = inner.local_hash(&path).await;
                enqueue_push(&inner, path, hash);
            }
            Ok(BackingEvent::FolderRemoved(path)) => {
                debug!(%path, "folder removed locally");
            }
            Err(RecvError::Lagged(missed)) => {
                // The sweep recovers whatever we missed.
                warn!(missed, "backing event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// React to remote change signals with targeted pulls, skipping signals
/// whose hash already matches local state.
async fn listen_notifications(
    inner: Arc<Inner>,
    mut changes: tokio::sync::broadcast::Receiver<ContentChange>,
) {
    loop {
        match changes.recv().await {
            Ok(ContentChange {
                remote_id,
                path,
                hash,
            }) => {
                if inner.local_hash(&path).await == Some(hash) {
                    debug!(%remote_id, %path, "already have notified hash");
                    continue;
                }
                enqueue_pull(&inner, Some(remote_id), path, Some(hash));
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "notification stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Leading-edge periodic full sweep: pull then push from the root, once
/// immediately and then on every tick.
async fn sweep(inner: Arc<Inner>) {
    let root = inner.reconciler.backing.root();
    let mut ticks = tokio::time::interval(inner.config.sweep_interval);
    loop {
        ticks.tick().await;
        debug!(%root, "sweep tick");
        enqueue_pull(&inner, None, root.clone(), None);
        enqueue_push(&inner, root.clone(), None);
    }
}
