//! Client half of the pull protocol.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use sync_store::{with_lock, HeldLocks};
use sync_types::{Glob, PullItem, RemoteId, StructHashes, SyncError, SyncableId, SyncablePath};

use super::{compute_local_hashes, BoxFuture, Reconciler};
use crate::remote::RemoteAccessor;

impl Reconciler {
    /// Pull `path` from every configured remote.
    ///
    /// Remotes are tried in id order. `NotFound` from one remote is
    /// benign (the item simply has not reached it yet); only when every
    /// remote reports `NotFound` does the pull fail with it. Any other
    /// error aborts immediately. Under the default policy the fan-out
    /// stops at the first remote that succeeds; a `requires_all` policy
    /// visits them all.
    pub async fn pull_from_remotes(
        &self,
        held: &HeldLocks,
        path: &SyncablePath,
        glob: &Glob,
    ) -> Result<(), SyncError> {
        if self.remotes.is_empty() {
            return Ok(());
        }
        let mut missing = 0usize;
        let mut pulled = 0usize;
        for remote_id in self.remotes.keys() {
            match self.pull_from_remote(held, remote_id, path, glob).await {
                Ok(()) => {
                    pulled += 1;
                    if !self.policy.requires_all(path) {
                        break;
                    }
                }
                Err(err) if err.is_not_found() => {
                    debug!(%remote_id, %path, "remote does not have path yet");
                    missing += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if pulled == 0 && missing == self.remotes.len() {
            return Err(SyncError::NotFound(path.to_string()));
        }
        Ok(())
    }

    /// Pull `path` from one remote and reconcile both ways.
    ///
    /// Sends the local hash cursor, applies the returned delta, and
    /// while walking it pushes back children only this replica has. A
    /// locally absent `path` is a valid first sync (empty cursor).
    pub async fn pull_from_remote(
        &self,
        held: &HeldLocks,
        remote_id: &RemoteId,
        path: &SyncablePath,
        glob: &Glob,
    ) -> Result<(), SyncError> {
        let remote = self.remote(remote_id)?.clone();
        let cursor = match compute_local_hashes(self.backing.as_ref(), path, glob).await {
            Ok(cursor) => cursor,
            Err(err) if err.is_not_found() => StructHashes::empty(),
            Err(err) => return Err(err),
        };
        let strategy = self.policy.strategy_for(path);
        let item = remote
            .puller(path, &cursor, glob, true, &strategy)
            .await?;
        if item.is_in_sync() {
            return Ok(());
        }
        debug!(%remote_id, %path, "applying pull delta");
        self.apply_pull_item(held, &remote, glob, Vec::new(), path.clone(), item)
            .await
    }

    /// Write one node of a pull delta and recurse into its children.
    ///
    /// `rel` is the node's path relative to the pull base; the caller's
    /// glob is evaluated against it, so divergence outside the requested
    /// scope is left alone in both directions.
    fn apply_pull_item<'a>(
        &'a self,
        held: &'a HeldLocks,
        remote: &'a Arc<dyn RemoteAccessor>,
        glob: &'a Glob,
        rel: Vec<SyncableId>,
        path: SyncablePath,
        item: PullItem,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            match item {
                PullItem::InSync => Ok(()),
                // Divergence reported without content. Outside the glob
                // that is the normal answer for a skipped subtree;
                // inside it the remote held data back, so fetch the
                // node directly.
                PullItem::HashOnly { .. } | PullItem::File { data: None, .. } => {
                    let folder_like = path
                        .last_id()
                        .map(SyncableId::is_folder_like)
                        .unwrap_or(true);
                    let in_scope =
                        glob.matches(&rel) || (folder_like && glob.should_descend(&rel));
                    if !in_scope {
                        debug!(%path, "skipping divergence outside the pull scope");
                        return Ok(());
                    }
                    let cursor =
                        match compute_local_hashes(self.backing.as_ref(), &path, &Glob::all())
                            .await
                        {
                            Ok(cursor) => cursor,
                            Err(err) if err.is_not_found() => StructHashes::empty(),
                            Err(err) => return Err(err),
                        };
                    let strategy = self.policy.strategy_for(&path);
                    let item = remote
                        .puller(&path, &cursor, &Glob::all(), true, &strategy)
                        .await?;
                    if item.is_in_sync() {
                        return Ok(());
                    }
                    self.apply_pull_item(held, remote, &Glob::all(), Vec::new(), path, item)
                        .await
                }
                PullItem::File {
                    metadata,
                    data: Some(data),
                    ..
                } => {
                    let key = Self::lock_key(&path);
                    with_lock(
                        held,
                        self.locks.as_ref(),
                        &key,
                        self.lock_timeout,
                        self.lock_lease,
                        || async {
                            self.backing
                                .create_binary_file_with_path(&path, metadata.provenance, data)
                                .await
                        },
                    )
                    .await
                }
                PullItem::FolderLike {
                    metadata,
                    items_by_id,
                } => {
                    let key = Self::lock_key(&path);
                    with_lock(
                        held,
                        self.locks.as_ref(),
                        &key,
                        self.lock_timeout,
                        self.lock_lease,
                        || async {
                            // The storage root always exists; only
                            // interior folders need creating.
                            if !path.is_root() {
                                self.backing
                                    .create_folder_with_path(&path, metadata.provenance)
                                    .await?;
                            }

                            let remote_ids: BTreeSet<_> = items_by_id.keys().cloned().collect();
                            for (id, child) in items_by_id {
                                let mut child_rel = rel.clone();
                                child_rel.push(id.clone());
                                let child_path = path.child(id);
                                self.apply_pull_item(
                                    held, remote, glob, child_rel, child_path, child,
                                )
                                .await?;
                            }

                            // Children only this replica has go back the
                            // other way, trust material first. Only
                            // in-scope children travel.
                            let local_ids = match self.backing.get_ids_in_path(&path).await {
                                Ok(ids) => ids,
                                Err(err) if err.is_not_found() => Vec::new(),
                                Err(err) => return Err(err),
                            };
                            let local_only = local_ids
                                .into_iter()
                                .filter(|id| !remote_ids.contains(id))
                                .filter(|id| {
                                    let mut child_rel = rel.clone();
                                    child_rel.push(id.clone());
                                    glob.matches(&child_rel)
                                        || (id.is_folder_like() && glob.should_descend(&child_rel))
                                })
                                .collect();
                            for id in sync_core::push_order(local_only) {
                                self.push_create(remote, path.child(id)).await?;
                            }
                            Ok(())
                        },
                    )
                    .await
                }
            }
        })
    }
}
