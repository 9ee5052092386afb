//! Per-item metadata records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ItemHash;

/// An opaque, cryptographically verifiable creation record.
///
/// Owned and validated by the external access-control layer; the sync
/// engine only carries it alongside the item it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Provenance(Vec<u8>);

impl Provenance {
    /// Wrap raw provenance bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw provenance bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provenance([{} bytes])", self.0.len())
    }
}

/// Metadata of one syncable item as stored by a backing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncableItemMetadata {
    /// Opaque (typically encrypted) name component, matching the item's id.
    pub name: String,
    /// Externally verified creation record.
    pub provenance: Provenance,
    /// Content-address of the item (includes child hashes for folder-likes).
    pub hash: ItemHash,
    /// Size of the item's own content in bytes.
    pub size_bytes: u64,
    /// Number of descendants below this item (0 for files).
    pub num_descendants: u64,
}

impl SyncableItemMetadata {
    /// Metadata for a freshly created item with no descendants.
    pub fn new(name: impl Into<String>, provenance: Provenance, hash: ItemHash, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            provenance,
            hash,
            size_bytes,
            num_descendants: 0,
        }
    }
}
