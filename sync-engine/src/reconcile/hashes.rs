//! Building snapshots and hash cursors from a backing.

use std::collections::BTreeMap;

use sync_core::{organize_for_pull, snapshot_hashes, TreeSnapshot};
use sync_store::StoreBacking;
use sync_types::{
    Glob, ItemHash, ItemKind, PullItem, StructHashes, SyncError, SyncableId, SyncablePath,
};

use super::BoxFuture;

/// Load an owned snapshot of the subtree at `base`, scoped by `glob`.
///
/// Every folder node learns the hashes of all its direct children
/// (metadata reads); only glob-matched children are expanded into full
/// nodes. With `with_data`, in-scope file bytes are loaded too.
pub async fn load_snapshot(
    backing: &dyn StoreBacking,
    base: &SyncablePath,
    glob: &Glob,
    with_data: bool,
) -> Result<TreeSnapshot, SyncError> {
    let kind = base.last_id().map(|id| id.kind).unwrap_or(ItemKind::Folder);
    walk(backing, base.clone(), Vec::new(), kind, glob, with_data).await
}

fn walk<'a>(
    backing: &'a dyn StoreBacking,
    path: SyncablePath,
    rel: Vec<SyncableId>,
    kind: ItemKind,
    glob: &'a Glob,
    with_data: bool,
) -> BoxFuture<'a, Result<TreeSnapshot, SyncError>> {
    Box::pin(async move {
        let metadata = backing.get_metadata_at_path(&path).await?;
        if kind == ItemKind::File {
            let data = if with_data {
                Some(backing.get_at_path(&path).await?)
            } else {
                None
            };
            return Ok(TreeSnapshot::File { metadata, data });
        }

        let ids = backing.get_ids_in_path(&path).await?;
        let mut child_hashes: BTreeMap<SyncableId, ItemHash> = BTreeMap::new();
        let mut children: BTreeMap<SyncableId, TreeSnapshot> = BTreeMap::new();
        for id in ids {
            let child_meta = backing.get_metadata_by_id_in_path(&path, &id).await?;
            child_hashes.insert(id.clone(), child_meta.hash);

            let mut child_rel = rel.clone();
            child_rel.push(id.clone());
            let expand = if id.is_folder_like() {
                glob.matches(&child_rel) || glob.should_descend(&child_rel)
            } else {
                glob.matches(&child_rel)
            };
            if expand {
                let child = walk(
                    backing,
                    path.child(id.clone()),
                    child_rel,
                    id.kind,
                    glob,
                    with_data,
                )
                .await?;
                children.insert(id, child);
            }
        }

        Ok(TreeSnapshot::FolderLike {
            kind,
            metadata,
            child_hashes,
            children,
        })
    })
}

/// Hash-tree cursor for the subtree at `base`, rooted at `base`'s own
/// hash. Fails `NotFound` if `base` does not exist.
pub async fn compute_local_hashes(
    backing: &dyn StoreBacking,
    base: &SyncablePath,
    glob: &Glob,
) -> Result<StructHashes, SyncError> {
    let snapshot = load_snapshot(backing, base, glob, false).await?;
    Ok(snapshot_hashes(&snapshot))
}

/// Answer a puller from this backing's tree.
///
/// This is the server half of the pull protocol: the puller's cursor
/// comes in, the out-of-sync delta goes out. Fails `NotFound` if `base`
/// does not exist locally.
pub async fn pull_local(
    backing: &dyn StoreBacking,
    base: &SyncablePath,
    cursor: &StructHashes,
    glob: &Glob,
    send_data: bool,
) -> Result<PullItem, SyncError> {
    let snapshot = load_snapshot(backing, base, glob, send_data).await?;
    Ok(organize_for_pull(&snapshot, cursor))
}
