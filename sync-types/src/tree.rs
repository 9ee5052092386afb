//! The recursive hash-tree cursor exchanged between replicas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ItemHash, SyncError, SyncableId};

/// A sparse snapshot of one replica's hash tree, relative to a base path.
///
/// Sent to a peer as the cursor for a pull so that only divergent
/// subtrees are inspected. Both fields are optional: a node may carry
/// only a hash (leaf or unexpanded subtree), only children (hash not yet
/// computed), or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StructHashes {
    /// Hash of the item at this position, if known.
    pub hash: Option<ItemHash>,
    /// Hashes of children, keyed by id, if this subtree was expanded.
    pub contents: Option<BTreeMap<SyncableId, StructHashes>>,
}

impl StructHashes {
    /// A node carrying only a hash.
    pub fn leaf(hash: ItemHash) -> Self {
        Self {
            hash: Some(hash),
            contents: None,
        }
    }

    /// A node carrying a hash and expanded children.
    pub fn node(hash: ItemHash, contents: BTreeMap<SyncableId, StructHashes>) -> Self {
        Self {
            hash: Some(hash),
            contents: Some(contents),
        }
    }

    /// An empty cursor: nothing known about the peer's tree.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The cursor node for a direct child, if present.
    pub fn child(&self, id: &SyncableId) -> Option<&StructHashes> {
        self.contents.as_ref()?.get(id)
    }

    /// The hash recorded for a direct child, if any.
    pub fn child_hash(&self, id: &SyncableId) -> Option<ItemHash> {
        self.child(id)?.hash
    }

    /// Descend along relative id segments.
    pub fn descend(&self, rel: &[SyncableId]) -> Option<&StructHashes> {
        let mut node = self;
        for id in rel {
            node = node.child(id)?;
        }
        Some(node)
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        rmp_serde::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        rmp_serde::from_slice(bytes).map_err(SyncError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(data: &[u8]) -> ItemHash {
        ItemHash::of_content(data)
    }

    #[test]
    fn empty_cursor_knows_nothing() {
        let cursor = StructHashes::empty();
        assert!(cursor.hash.is_none());
        assert!(cursor.child(&SyncableId::file("x")).is_none());
    }

    #[test]
    fn descend_walks_nested_children() {
        let file = SyncableId::file("msg");
        let folder = SyncableId::folder("inbox");

        let inner = StructHashes::node(
            hash(b"inbox"),
            vec![(file.clone(), StructHashes::leaf(hash(b"msg")))]
                .into_iter()
                .collect(),
        );
        let outer = StructHashes::node(
            hash(b"root"),
            vec![(folder.clone(), inner)].into_iter().collect(),
        );

        let found = outer.descend(&[folder, file]).unwrap();
        assert_eq!(found.hash, Some(hash(b"msg")));
        assert!(outer.descend(&[SyncableId::folder("sent")]).is_none());
    }

    #[test]
    fn codec_roundtrip() {
        let cursor = StructHashes::node(
            hash(b"root"),
            vec![(SyncableId::file("a"), StructHashes::leaf(hash(b"a")))]
                .into_iter()
                .collect(),
        );
        let bytes = cursor.to_bytes().unwrap();
        assert_eq!(StructHashes::from_bytes(&bytes).unwrap(), cursor);
    }
}
