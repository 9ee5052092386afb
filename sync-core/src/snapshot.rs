//! Owned point-in-time views of a subtree.

use std::collections::BTreeMap;

use sync_types::{ItemHash, ItemKind, StructHashes, SyncableId, SyncableItemMetadata};

/// An owned snapshot of one subtree of a replica.
///
/// Built by the engine from a storage backing (scoped by a glob), then
/// handed to the pure diff functions. A folder node always knows the
/// hashes of *all* its direct children (`child_hashes`, cheap metadata
/// reads) but carries full child nodes only for children in scope
/// (`children`). Strict ownership: a node cannot contain itself by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSnapshot {
    /// A file, optionally with its content loaded (`send_data` pulls).
    File {
        /// Metadata as stored by the backing.
        metadata: SyncableItemMetadata,
        /// Content bytes, when the snapshot was built with data loading.
        data: Option<Vec<u8>>,
    },
    /// A folder or bundle.
    FolderLike {
        /// Folder or bundle.
        kind: ItemKind,
        /// Metadata as stored by the backing.
        metadata: SyncableItemMetadata,
        /// Hashes of all direct children, in id order.
        child_hashes: BTreeMap<SyncableId, ItemHash>,
        /// Fully expanded children (the glob-matched subset).
        children: BTreeMap<SyncableId, TreeSnapshot>,
    },
}

impl TreeSnapshot {
    /// The metadata of the item at this node.
    pub fn metadata(&self) -> &SyncableItemMetadata {
        match self {
            TreeSnapshot::File { metadata, .. } => metadata,
            TreeSnapshot::FolderLike { metadata, .. } => metadata,
        }
    }

    /// The content hash at this node.
    pub fn hash(&self) -> ItemHash {
        self.metadata().hash
    }

    /// Whether this node is a folder or bundle.
    pub fn is_folder_like(&self) -> bool {
        matches!(self, TreeSnapshot::FolderLike { .. })
    }
}

/// Project a snapshot into the [`StructHashes`] cursor a replica sends to
/// a peer.
///
/// Only expanded (in-scope) children appear; the cursor stays sparse.
/// The root hash is always the snapshot root's own hash.
pub fn snapshot_hashes(snapshot: &TreeSnapshot) -> StructHashes {
    match snapshot {
        TreeSnapshot::File { metadata, .. } => StructHashes::leaf(metadata.hash),
        TreeSnapshot::FolderLike {
            metadata, children, ..
        } => {
            let contents = children
                .iter()
                .map(|(id, child)| (id.clone(), snapshot_hashes(child)))
                .collect();
            StructHashes::node(metadata.hash, contents)
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use sync_types::Provenance;

    pub fn file_meta(name: &str, content: &[u8]) -> SyncableItemMetadata {
        SyncableItemMetadata::new(
            name,
            Provenance::default(),
            ItemHash::of_content(content),
            content.len() as u64,
        )
    }

    pub fn file(name: &str, content: &[u8]) -> TreeSnapshot {
        TreeSnapshot::File {
            metadata: file_meta(name, content),
            data: Some(content.to_vec()),
        }
    }

    /// Build a folder whose hash follows the content-addressing rule.
    pub fn folder(name: &str, children: Vec<(SyncableId, TreeSnapshot)>) -> TreeSnapshot {
        folder_of_kind(ItemKind::Folder, name, children)
    }

    pub fn bundle(name: &str, children: Vec<(SyncableId, TreeSnapshot)>) -> TreeSnapshot {
        folder_of_kind(ItemKind::Bundle, name, children)
    }

    fn folder_of_kind(
        kind: ItemKind,
        name: &str,
        children: Vec<(SyncableId, TreeSnapshot)>,
    ) -> TreeSnapshot {
        let children: BTreeMap<SyncableId, TreeSnapshot> = children.into_iter().collect();
        let child_hashes: BTreeMap<SyncableId, ItemHash> = children
            .iter()
            .map(|(id, child)| (id.clone(), child.hash()))
            .collect();
        let own = ItemHash::of_content(name.as_bytes());
        let num_descendants = children
            .values()
            .map(|c| 1 + c.metadata().num_descendants)
            .sum();
        let mut metadata = SyncableItemMetadata::new(
            name,
            Provenance::default(),
            ItemHash::of_children(own, &child_hashes),
            0,
        );
        metadata.num_descendants = num_descendants;
        TreeSnapshot::FolderLike {
            kind,
            metadata,
            child_hashes,
            children,
        }
    }
}
