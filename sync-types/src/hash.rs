//! Content-addressed item hashes.
//!
//! A file hashes over its own bytes. A folder or bundle hashes over its
//! own content hash plus the `(id, child-hash)` pairs of all direct
//! children in id order. This gives the content-addressing invariant the
//! whole engine rests on: two folders with identical child sets hash
//! identically, and any descendant change ripples up to every ancestor.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::SyncableId;

/// A 32-byte SHA-256 content hash of one syncable item.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemHash([u8; 32]);

impl ItemHash {
    /// Hash the content bytes of a file-like item.
    pub fn of_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"canopy-file-v1");
        hasher.update(content);
        Self(hasher.finalize().into())
    }

    /// Combine a folder-like item's own content hash with the hashes of
    /// its direct children.
    ///
    /// The `BTreeMap` fixes the iteration order, so the result depends
    /// only on the `(id, child-hash)` set, never on insertion order.
    pub fn of_children(own: ItemHash, children: &BTreeMap<SyncableId, ItemHash>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"canopy-folder-v1");
        hasher.update(own.0);
        for (id, child) in children {
            let id_form = id.to_string();
            hasher.update((id_form.len() as u64).to_be_bytes());
            hasher.update(id_form.as_bytes());
            hasher.update(child.0);
        }
        Self(hasher.finalize().into())
    }

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ItemHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl fmt::Debug for ItemHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemHash({})", &self.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(ItemHash::of_content(b"hello"), ItemHash::of_content(b"hello"));
        assert_ne!(ItemHash::of_content(b"hello"), ItemHash::of_content(b"world"));
    }

    #[test]
    fn folder_hash_ignores_insertion_order() {
        let own = ItemHash::of_content(b"folder-meta");
        let a = (SyncableId::file("a"), ItemHash::of_content(b"a"));
        let b = (SyncableId::file("b"), ItemHash::of_content(b"b"));

        let forward: BTreeMap<_, _> = vec![a.clone(), b.clone()].into_iter().collect();
        let reverse: BTreeMap<_, _> = vec![b, a].into_iter().collect();

        assert_eq!(
            ItemHash::of_children(own, &forward),
            ItemHash::of_children(own, &reverse)
        );
    }

    #[test]
    fn folder_hash_changes_with_any_child() {
        let own = ItemHash::of_content(b"folder-meta");
        let mut children: BTreeMap<_, _> = vec![
            (SyncableId::file("a"), ItemHash::of_content(b"a")),
            (SyncableId::file("b"), ItemHash::of_content(b"b")),
        ]
        .into_iter()
        .collect();

        let before = ItemHash::of_children(own, &children);
        children.insert(SyncableId::file("a"), ItemHash::of_content(b"a2"));
        let after = ItemHash::of_children(own, &children);

        assert_ne!(before, after);
    }

    #[test]
    fn folder_and_file_domains_are_separated() {
        // An empty folder never collides with a file of the same bytes.
        let as_file = ItemHash::of_content(b"x");
        let as_folder = ItemHash::of_children(ItemHash::of_content(b"x"), &BTreeMap::new());
        assert_ne!(as_file, as_folder);
    }

    #[test]
    fn display_is_url_safe_base64() {
        let hash = ItemHash::of_content(b"data");
        let shown = hash.to_string();
        assert_eq!(shown.len(), 43); // 32 bytes, no padding
        assert!(!shown.contains('='));
    }
}
