//! Client half of the push protocol.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use sync_core::push_order;
use sync_types::{Glob, ItemKind, PullItem, RemoteId, SyncError, SyncablePath};

use super::{compute_local_hashes, BoxFuture, Reconciler};
use crate::remote::RemoteAccessor;

impl Reconciler {
    /// Push `path` to every configured remote.
    ///
    /// Mirrors the pull fan-out: per-remote `NotFound` of the *local*
    /// path aborts (nothing to push), remote errors other than that are
    /// fatal, and the policy decides between first-success and
    /// must-reach-all.
    pub async fn push_to_remotes(
        &self,
        path: &SyncablePath,
        glob: &Glob,
    ) -> Result<(), SyncError> {
        for remote_id in self.remotes.keys() {
            self.push_to_remote(remote_id, path, glob).await?;
            if !self.policy.requires_all(path) {
                break;
            }
        }
        Ok(())
    }

    /// Push `path` to one remote.
    ///
    /// Probes with a data-less pull first: `InSync` means nothing to
    /// send, remote `NotFound` means the whole subtree is created, and
    /// a delta answer narrows the push to the diverging subset.
    pub async fn push_to_remote(
        &self,
        remote_id: &RemoteId,
        path: &SyncablePath,
        glob: &Glob,
    ) -> Result<(), SyncError> {
        let remote = self.remote(remote_id)?.clone();
        let cursor = compute_local_hashes(self.backing.as_ref(), path, glob).await?;
        let strategy = self.policy.strategy_for(path);
        match remote.puller(path, &cursor, glob, false, &strategy).await {
            Err(err) if err.is_not_found() => {
                debug!(%remote_id, %path, "remote missing path, creating subtree");
                self.push_create(&remote, path.clone()).await
            }
            Err(err) => Err(err),
            Ok(PullItem::InSync) => Ok(()),
            Ok(probe) => {
                debug!(%remote_id, %path, "pushing diverging subset");
                self.push_delta(&remote, path.clone(), probe).await
            }
        }
    }

    /// Create the whole local subtree at `path` on the remote.
    ///
    /// The node itself goes first, then its children in push order, so
    /// the access-control bundle lands before any sibling content.
    pub(crate) fn push_create<'a>(
        &'a self,
        remote: &'a Arc<dyn RemoteAccessor>,
        path: SyncablePath,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            let kind = path
                .last_id()
                .map(|id| id.kind)
                .unwrap_or(ItemKind::Folder);
            let metadata = self.backing.get_metadata_at_path(&path).await?;
            if !path.is_root() {
                let data = if kind == ItemKind::File {
                    Some(self.backing.get_at_path(&path).await?)
                } else {
                    None
                };
                remote
                    .pusher(kind, &path, metadata.provenance, data)
                    .await?;
            }

            if kind.is_folder_like() {
                let ids = self.backing.get_ids_in_path(&path).await?;
                for id in push_order(ids) {
                    self.push_create(remote, path.child(id)).await?;
                }
            }
            Ok(())
        })
    }

    /// Push only what a status probe reported as diverging.
    ///
    /// `probe` is the remote's data-less answer to our cursor: `InSync`
    /// children are skipped, diverging ones are re-sent from local
    /// state, and children absent from the answer exist only here and
    /// are created remotely.
    fn push_delta<'a>(
        &'a self,
        remote: &'a Arc<dyn RemoteAccessor>,
        path: SyncablePath,
        probe: PullItem,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            match probe {
                PullItem::InSync => Ok(()),
                // Remote has a diverging file (or unexpanded node) where
                // we have local content; overwrite it from local state.
                PullItem::File { .. } | PullItem::HashOnly { .. } => {
                    self.push_create(remote, path).await
                }
                PullItem::FolderLike { items_by_id, .. } => {
                    if !path.is_root() {
                        let metadata = self.backing.get_metadata_at_path(&path).await?;
                        remote
                            .pusher(
                                path.last_id().map(|id| id.kind).unwrap_or(ItemKind::Folder),
                                &path,
                                metadata.provenance,
                                None,
                            )
                            .await?;
                    }

                    let remote_ids: BTreeSet<_> = items_by_id.keys().cloned().collect();
                    let local_ids = self.backing.get_ids_in_path(&path).await?;
                    let local_only: Vec<_> = local_ids
                        .into_iter()
                        .filter(|id| !remote_ids.contains(id))
                        .collect();

                    // One ordered pass over divergent-on-remote and
                    // local-only children together.
                    let mut pending = items_by_id;
                    let mut ids: Vec<_> = pending.keys().cloned().collect();
                    ids.extend(local_only.iter().cloned());
                    for id in push_order(ids) {
                        let child_path = path.child(id.clone());
                        match pending.remove(&id) {
                            Some(PullItem::InSync) => {}
                            Some(child) => {
                                // Skip children we do not have locally;
                                // pushing is one-directional.
                                match self
                                    .backing
                                    .get_metadata_at_path(&child_path)
                                    .await
                                {
                                    Ok(_) => {
                                        self.push_delta(remote, child_path, child).await?
                                    }
                                    Err(err) if err.is_not_found() => {}
                                    Err(err) => return Err(err),
                                }
                            }
                            None => self.push_create(remote, child_path).await?,
                        }
                    }
                    Ok(())
                }
            }
        })
    }
}
