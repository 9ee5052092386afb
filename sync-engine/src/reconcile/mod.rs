//! Walking the local backing against remote replicas.

mod hashes;
mod pull;
mod push;

pub use hashes::{compute_local_hashes, load_snapshot, pull_local};

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use sync_store::{HeldLocks, LockStore, StoreBacking};
use sync_types::{RemoteId, SyncablePath};

use crate::remote::{FirstSuccessPolicy, RemoteAccessor, RemotePolicy};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(60);

/// Pull/push reconciliation against a set of remotes.
///
/// Holds references to the backing, the remote accessors and the lock
/// store for the lifetime of the service that owns it; it owns none of
/// them. Writers take the path's lock for the whole read-modify-write
/// cycle; point-in-time hash reads do not.
pub struct Reconciler {
    pub(crate) backing: Arc<dyn StoreBacking>,
    pub(crate) remotes: BTreeMap<RemoteId, Arc<dyn RemoteAccessor>>,
    pub(crate) policy: Arc<dyn RemotePolicy>,
    pub(crate) locks: Arc<dyn LockStore>,
    pub(crate) lock_timeout: Duration,
    pub(crate) lock_lease: Duration,
}

impl Reconciler {
    /// Create a reconciler over a backing and its remotes.
    pub fn new(
        backing: Arc<dyn StoreBacking>,
        remotes: BTreeMap<RemoteId, Arc<dyn RemoteAccessor>>,
        locks: Arc<dyn LockStore>,
    ) -> Self {
        Self {
            backing,
            remotes,
            policy: Arc::new(FirstSuccessPolicy),
            locks,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_lease: DEFAULT_LOCK_LEASE,
        }
    }

    /// Replace the fan-out policy.
    pub fn with_policy(mut self, policy: Arc<dyn RemotePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Override lock timing (mainly for tests).
    pub fn with_lock_timing(mut self, timeout: Duration, lease: Duration) -> Self {
        self.lock_timeout = timeout;
        self.lock_lease = lease;
        self
    }

    /// The ids of the configured remotes.
    pub fn remote_ids(&self) -> impl Iterator<Item = &RemoteId> {
        self.remotes.keys()
    }

    pub(crate) fn remote(
        &self,
        remote_id: &RemoteId,
    ) -> Result<&Arc<dyn RemoteAccessor>, sync_types::SyncError> {
        self.remotes
            .get(remote_id)
            .ok_or_else(|| sync_types::SyncError::Internal(format!("unknown remote {remote_id}")))
    }

    /// Fresh reentrancy context for one logical operation chain.
    pub fn new_chain(&self) -> HeldLocks {
        HeldLocks::new()
    }

    pub(crate) fn lock_key(path: &SyncablePath) -> String {
        path.to_string()
    }
}
