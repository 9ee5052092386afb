//! The out-of-sync delta a puller receives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ItemHash, SyncError, SyncableId, SyncableItemMetadata};

/// The per-item result of diffing a replica against a puller's cursor.
///
/// A closed tagged union: the four shapes a peer can report for an item.
/// `HashOnly` is the data-less status answer (`send_data = false`); it
/// carries enough to compare but never triggers a local write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PullItem {
    /// The item matches the cursor hash; the subtree was skipped.
    InSync,
    /// The item differs, but only its hash was requested.
    HashOnly {
        /// The live hash on the answering replica.
        hash: ItemHash,
    },
    /// A diverging file, with content when the puller asked for data.
    File {
        /// Full metadata of the file on the answering replica.
        metadata: SyncableItemMetadata,
        /// Content size in bytes (present even when `data` is omitted).
        size_bytes: u64,
        /// File content, when `send_data` was requested.
        data: Option<Vec<u8>>,
    },
    /// A diverging folder or bundle with per-child results.
    FolderLike {
        /// Full metadata of the container on the answering replica.
        metadata: SyncableItemMetadata,
        /// Per-child pull results, keyed by id.
        items_by_id: BTreeMap<SyncableId, PullItem>,
    },
}

impl PullItem {
    /// Whether this result reports the item as already in sync.
    pub fn is_in_sync(&self) -> bool {
        matches!(self, PullItem::InSync)
    }

    /// The remote hash this result reports, if it carries one.
    pub fn hash(&self) -> Option<ItemHash> {
        match self {
            PullItem::InSync => None,
            PullItem::HashOnly { hash } => Some(*hash),
            PullItem::File { metadata, .. } | PullItem::FolderLike { metadata, .. } => {
                Some(metadata.hash)
            }
        }
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
    use crate::Provenance;

    fn file_meta(content: &[u8]) -> SyncableItemMetadata {
        SyncableItemMetadata::new(
            "enc",
            Provenance::default(),
            ItemHash::of_content(content),
            content.len() as u64,
        )
    }

    #[test]
    fn in_sync_has_no_hash() {
        assert!(PullItem::InSync.is_in_sync());
        assert!(PullItem::InSync.hash().is_none());
    }

    #[test]
    fn hash_comes_from_metadata() {
        let meta = file_meta(b"content");
        let item = PullItem::File {
            size_bytes: meta.size_bytes,
            metadata: meta.clone(),
            data: None,
        };
        assert_eq!(item.hash(), Some(meta.hash));
    }

    #[test]
    fn json_form_is_tagged() {
        let value = serde_json::to_value(PullItem::InSync).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "InSync" }));
    }

    #[test]
    fn codec_roundtrip_nested_folder() {
        let child = PullItem::File {
            metadata: file_meta(b"msg"),
            size_bytes: 3,
            data: Some(b"msg".to_vec()),
        };
        let folder = PullItem::FolderLike {
            metadata: file_meta(b"folder"),
            items_by_id: vec![
                (SyncableId::file("msg"), child),
                (SyncableId::folder("sub"), PullItem::InSync),
            ]
            .into_iter()
            .collect(),
        };

        let bytes = folder.to_bytes().unwrap();
        assert_eq!(PullItem::from_bytes(&bytes).unwrap(), folder);
    }
}
