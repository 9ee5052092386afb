//! The remote replica seam.
//!
//! A [`RemoteAccessor`] is everything the engine needs from a peer: a
//! `puller` that answers hash-tree diffs and a `pusher` that accepts
//! creates and updates. Transports (HTTP, QUIC, whatever the deployment
//! uses) implement this trait externally; [`LocalRemote`] adapts any
//! [`StoreBacking`] into an accessor, which is both the loopback case
//! and the test double.

use async_trait::async_trait;
use std::sync::Arc;

use sync_types::{
    Glob, ItemKind, Provenance, PullItem, StructHashes, SyncError, SyncablePath,
};

use crate::reconcile::pull_local;
use sync_store::StoreBacking;

/// Opaque pull strategy forwarded to a remote's puller.
///
/// The engine never interprets this; which strategy applies to which
/// path is decided by the [`RemotePolicy`] in use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// The remote's default traversal.
    #[default]
    Full,
    /// Remote-defined shallow/recent-first traversal.
    Recent,
    /// Deployment-specific strategy, passed through verbatim.
    Custom(String),
}

/// Access to one remote replica.
#[async_trait]
pub trait RemoteAccessor: Send + Sync {
    /// Ask the remote to diff its tree at `path` against our cursor.
    ///
    /// With `send_data` the response carries file bytes for divergent
    /// in-scope files; without it the response is a status check only.
    async fn puller(
        &self,
        path: &SyncablePath,
        local_hashes: &StructHashes,
        glob: &Glob,
        send_data: bool,
        strategy: &SyncStrategy,
    ) -> Result<PullItem, SyncError>;

    /// Create or update one item on the remote.
    ///
    /// Folder-likes carry no data; files must.
    async fn pusher(
        &self,
        kind: ItemKind,
        path: &SyncablePath,
        provenance: Provenance,
        data: Option<Vec<u8>>,
    ) -> Result<(), SyncError>;
}

/// Per-path policy for multi-remote fan-out.
///
/// Deliberately opaque: deployments decide which paths must reach every
/// remote (broadcast writes) and which are satisfied by a single
/// canonical one, and which pull strategy each path uses.
pub trait RemotePolicy: Send + Sync {
    /// Whether work on `path` must succeed on *all* remotes, as opposed
    /// to stopping at the first success.
    fn requires_all(&self, path: &SyncablePath) -> bool;

    /// The pull strategy to use for `path`.
    fn strategy_for(&self, path: &SyncablePath) -> SyncStrategy;
}

/// Stop at the first remote that succeeds. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSuccessPolicy;

impl RemotePolicy for FirstSuccessPolicy {
    fn requires_all(&self, _path: &SyncablePath) -> bool {
        false
    }

    fn strategy_for(&self, _path: &SyncablePath) -> SyncStrategy {
        SyncStrategy::default()
    }
}

/// Every remote must succeed (broadcast writes).
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastPolicy;

impl RemotePolicy for BroadcastPolicy {
    fn requires_all(&self, _path: &SyncablePath) -> bool {
        true
    }

    fn strategy_for(&self, _path: &SyncablePath) -> SyncStrategy {
        SyncStrategy::default()
    }
}

/// A [`RemoteAccessor`] over a local [`StoreBacking`].
///
/// Serves loopback setups and tests: two backings bridged by a
/// `LocalRemote` behave exactly like two devices over a wire, minus the
/// transport.
#[derive(Clone)]
pub struct LocalRemote {
    backing: Arc<dyn StoreBacking>,
}

impl LocalRemote {
    /// Expose a backing as a remote.
    pub fn new(backing: Arc<dyn StoreBacking>) -> Self {
        Self { backing }
    }
}

#[async_trait]
impl RemoteAccessor for LocalRemote {
    async fn puller(
        &self,
        path: &SyncablePath,
        local_hashes: &StructHashes,
        glob: &Glob,
        send_data: bool,
        _strategy: &SyncStrategy,
    ) -> Result<PullItem, SyncError> {
        pull_local(self.backing.as_ref(), path, local_hashes, glob, send_data).await
    }

    async fn pusher(
        &self,
        kind: ItemKind,
        path: &SyncablePath,
        provenance: Provenance,
        data: Option<Vec<u8>>,
    ) -> Result<(), SyncError> {
        match kind {
            ItemKind::File => {
                let data = data.ok_or_else(|| {
                    SyncError::Internal(format!("file push without data: {path}"))
                })?;
                self.backing
                    .create_binary_file_with_path(path, provenance, data)
                    .await
            }
            ItemKind::Folder | ItemKind::Bundle => {
                // Idempotent on the backing side: re-pushing an existing
                // folder is a no-op.
                self.backing.create_folder_with_path(path, provenance).await
            }
        }
    }
}
