//! Diffing a snapshot against a puller's cursor.

use std::collections::BTreeMap;

use sync_types::{PullItem, StructHashes, SyncableId};

use crate::snapshot::TreeSnapshot;

/// Build the answer a replica sends a puller for one subtree.
///
/// The cursor is the puller's own [`StructHashes`] at the same relative
/// position. Matching hashes prune whole subtrees, so the cost is
/// proportional to the number of changed nodes:
///
/// - equal hash: [`PullItem::InSync`], subtree skipped
/// - diverging file: full metadata, plus bytes when the snapshot was
///   built with data (`send_data` pulls)
/// - diverging folder/bundle: recurse; children the traversal did not
///   expand are seeded from the parent's metadata-only child hashes
///   ([`PullItem::HashOnly`]), expanded children overwrite the seed with
///   full nodes
///
/// Because every map involved is id-ordered, the output is identical
/// regardless of the order items were supplied in.
pub fn organize_for_pull(snapshot: &TreeSnapshot, cursor: &StructHashes) -> PullItem {
    if cursor.hash == Some(snapshot.hash()) {
        return PullItem::InSync;
    }

    match snapshot {
        TreeSnapshot::File { metadata, data } => PullItem::File {
            metadata: metadata.clone(),
            size_bytes: metadata.size_bytes,
            data: data.clone(),
        },
        TreeSnapshot::FolderLike {
            metadata,
            child_hashes,
            children,
            ..
        } => {
            let mut items_by_id: BTreeMap<SyncableId, PullItem> = BTreeMap::new();
            for (id, child_hash) in child_hashes {
                let child_cursor = cursor.child(id).cloned().unwrap_or_default();
                let item = match children.get(id) {
                    Some(full) => organize_for_pull(full, &child_cursor),
                    None => {
                        // Metadata-only seed for out-of-scope children.
                        if child_cursor.hash == Some(*child_hash) {
                            PullItem::InSync
                        } else {
                            PullItem::HashOnly { hash: *child_hash }
                        }
                    }
                };
                items_by_id.insert(id.clone(), item);
            }
            PullItem::FolderLike {
                metadata: metadata.clone(),
                items_by_id,
            }
        }
    }
}
