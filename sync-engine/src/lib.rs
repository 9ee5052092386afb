//! # sync-engine
//!
//! Reconciliation engine and sync orchestration for Canopy.
//!
//! This is the I/O layer on top of the pure diff logic in `sync-core`:
//!
//! ```text
//! SyncService ─ enqueues ─▶ TaskQueue ─ runs ─▶ Reconciler
//!                                                  │
//!                                   StoreBacking ◀─┴─▶ RemoteAccessor
//! ```
//!
//! - [`Reconciler`] walks the local [`StoreBacking`](sync_store::StoreBacking)
//!   against remote replicas, pulling and pushing only divergent subtrees
//! - [`TaskQueue`] bounds concurrency and coalesces repeated work per path
//! - [`SyncService`] wires backing events, remote change notifications and
//!   a periodic sweep into the queues

#![warn(missing_docs)]
#![warn(clippy::all)]

mod notify;
mod queue;
mod reconcile;
mod remote;
mod service;

pub use notify::{ChangeNotifications, ContentChange, MockNotifier};
pub use queue::TaskQueue;
pub use reconcile::{compute_local_hashes, load_snapshot, pull_local, Reconciler};
pub use remote::{
    BroadcastPolicy, FirstSuccessPolicy, LocalRemote, RemoteAccessor, RemotePolicy, SyncStrategy,
};
pub use service::{PullRequest, PushRequest, SyncService, SyncServiceConfig};
