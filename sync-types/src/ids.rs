//! Identity types for Canopy syncables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known name of the access-control bundle inside a folder.
///
/// The engine never inspects its contents; it only enforces that this
/// bundle is reconciled before sibling content (see the push ordering).
pub const ACCESS_BUNDLE_NAME: &str = "access";

/// Well-known name of the store-changes bundle inside a folder.
pub const CHANGES_BUNDLE_NAME: &str = "changes";

/// The kind of a syncable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// A leaf item carrying binary content.
    File,
    /// A container of other syncables.
    Folder,
    /// A folder-like container that also hashes as a single file-like unit.
    Bundle,
}

impl ItemKind {
    /// Single-character tag used in the canonical string form.
    fn tag(self) -> char {
        match self {
            ItemKind::File => 'f',
            ItemKind::Folder => 'd',
            ItemKind::Bundle => 'b',
        }
    }

    /// Whether items of this kind contain children.
    pub fn is_folder_like(self) -> bool {
        matches!(self, ItemKind::Folder | ItemKind::Bundle)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::File => write!(f, "file"),
            ItemKind::Folder => write!(f, "folder"),
            ItemKind::Bundle => write!(f, "bundle"),
        }
    }
}

/// Identifier of one syncable within its parent.
///
/// The `name` component is opaque to the engine - typically it is the
/// encrypted form of the item's real name, so two replicas agree on it
/// without the engine ever learning the plaintext.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncableId {
    /// What kind of item this id addresses.
    pub kind: ItemKind,
    /// Opaque (typically encrypted) name component.
    pub name: String,
}

impl SyncableId {
    /// Create a file id.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::File,
            name: name.into(),
        }
    }

    /// Create a folder id.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Folder,
            name: name.into(),
        }
    }

    /// Create a bundle id.
    pub fn bundle(name: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Bundle,
            name: name.into(),
        }
    }

    /// Whether this id addresses a folder or bundle.
    pub fn is_folder_like(&self) -> bool {
        self.kind.is_folder_like()
    }

    /// Whether this is the access-control bundle of its parent.
    pub fn is_access_bundle(&self) -> bool {
        self.kind == ItemKind::Bundle && self.name == ACCESS_BUNDLE_NAME
    }

    /// Whether this is the store-changes bundle of its parent.
    pub fn is_changes_bundle(&self) -> bool {
        self.kind == ItemKind::Bundle && self.name == CHANGES_BUNDLE_NAME
    }
}

impl fmt::Display for SyncableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.tag(), self.name)
    }
}

impl fmt::Debug for SyncableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncableId({})", self)
    }
}

/// Identifier of a storage root (one replica-visible tree).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageRootId(String);

impl StorageRootId {
    /// Create a root id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The string form of this root id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageRootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StorageRootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageRootId({})", self.0)
    }
}

/// Identifier of one remote replica (server or peer device).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a remote id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The string form of this remote id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_carries_kind_tag() {
        assert_eq!(SyncableId::file("aGVsbG8").to_string(), "f:aGVsbG8");
        assert_eq!(SyncableId::folder("aW5ib3g").to_string(), "d:aW5ib3g");
        assert_eq!(SyncableId::bundle("access").to_string(), "b:access");
    }

    #[test]
    fn same_name_different_kind_are_distinct() {
        assert_ne!(SyncableId::file("x"), SyncableId::folder("x"));
        assert_ne!(SyncableId::folder("x"), SyncableId::bundle("x"));
    }

    #[test]
    fn folder_like_kinds() {
        assert!(SyncableId::folder("a").is_folder_like());
        assert!(SyncableId::bundle("a").is_folder_like());
        assert!(!SyncableId::file("a").is_folder_like());
    }

    #[test]
    fn well_known_bundles_detected() {
        assert!(SyncableId::bundle(ACCESS_BUNDLE_NAME).is_access_bundle());
        assert!(SyncableId::bundle(CHANGES_BUNDLE_NAME).is_changes_bundle());
        // A file named "access" is not the access bundle.
        assert!(!SyncableId::file(ACCESS_BUNDLE_NAME).is_access_bundle());
    }

    #[test]
    fn ids_order_deterministically() {
        let mut ids = vec![
            SyncableId::file("b"),
            SyncableId::folder("a"),
            SyncableId::file("a"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["f:a", "f:b", "d:a"]);
    }
}
