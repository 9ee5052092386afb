//! Hierarchical addressing of syncables.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{StorageRootId, SyncableId};

/// The full address of a syncable: a storage root plus the ordered ids
/// leading down to the item.
///
/// The canonical [`Display`](fmt::Display) form (`root/d:a/f:b`) doubles
/// as the queue key the sync service serializes work on, so two paths are
/// equal exactly when their string forms are equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncablePath {
    /// The storage root this path is anchored at.
    pub root: StorageRootId,
    /// Ids from the root down to the addressed item, outermost first.
    pub ids: Vec<SyncableId>,
}

impl SyncablePath {
    /// The path of a storage root itself.
    pub fn root(root: StorageRootId) -> Self {
        Self {
            root,
            ids: Vec::new(),
        }
    }

    /// Create a path from a root and id segments.
    pub fn new(root: StorageRootId, ids: Vec<SyncableId>) -> Self {
        Self { root, ids }
    }

    /// Whether this path addresses the storage root itself.
    pub fn is_root(&self) -> bool {
        self.ids.is_empty()
    }

    /// The id of the addressed item, or `None` for the root.
    pub fn last_id(&self) -> Option<&SyncableId> {
        self.ids.last()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<SyncablePath> {
        if self.ids.is_empty() {
            return None;
        }
        Some(SyncablePath {
            root: self.root.clone(),
            ids: self.ids[..self.ids.len() - 1].to_vec(),
        })
    }

    /// The path of a direct child.
    pub fn child(&self, id: SyncableId) -> SyncablePath {
        let mut ids = self.ids.clone();
        ids.push(id);
        SyncablePath {
            root: self.root.clone(),
            ids,
        }
    }

    /// Whether `self` is `other` or a descendant of it.
    pub fn starts_with(&self, other: &SyncablePath) -> bool {
        self.root == other.root
            && self.ids.len() >= other.ids.len()
            && self.ids[..other.ids.len()] == other.ids[..]
    }

    /// The id segments of `self` below `base`, or `None` if `self` is not
    /// under `base`.
    pub fn relative_to(&self, base: &SyncablePath) -> Option<&[SyncableId]> {
        if !self.starts_with(base) {
            return None;
        }
        Some(&self.ids[base.ids.len()..])
    }

    /// Depth below the storage root.
    pub fn depth(&self) -> usize {
        self.ids.len()
    }
}

impl fmt::Display for SyncablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for id in &self.ids {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SyncablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncablePath({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> StorageRootId {
        StorageRootId::new("mail")
    }

    #[test]
    fn display_is_canonical() {
        let path = SyncablePath::root(root())
            .child(SyncableId::folder("inbox"))
            .child(SyncableId::file("msg1"));
        assert_eq!(path.to_string(), "mail/d:inbox/f:msg1");
    }

    #[test]
    fn root_has_no_parent() {
        assert!(SyncablePath::root(root()).parent().is_none());
    }

    #[test]
    fn parent_drops_last_segment() {
        let child = SyncablePath::root(root()).child(SyncableId::folder("inbox"));
        let parent = child.parent().unwrap();
        assert!(parent.is_root());
        assert_eq!(parent.root, root());
    }

    #[test]
    fn starts_with_self_and_ancestors() {
        let base = SyncablePath::root(root()).child(SyncableId::folder("inbox"));
        let deep = base.child(SyncableId::file("msg"));
        assert!(deep.starts_with(&base));
        assert!(deep.starts_with(&deep));
        assert!(!base.starts_with(&deep));
    }

    #[test]
    fn starts_with_requires_same_root() {
        let a = SyncablePath::root(StorageRootId::new("a"));
        let b = SyncablePath::root(StorageRootId::new("b"));
        assert!(!a.starts_with(&b));
    }

    #[test]
    fn relative_to_returns_suffix() {
        let base = SyncablePath::root(root()).child(SyncableId::folder("inbox"));
        let deep = base
            .child(SyncableId::folder("2024"))
            .child(SyncableId::file("msg"));
        let rel = deep.relative_to(&base).unwrap();
        assert_eq!(rel.len(), 2);
        assert_eq!(rel[0], SyncableId::folder("2024"));

        let other = SyncablePath::root(root()).child(SyncableId::folder("sent"));
        assert!(other.relative_to(&base).is_none());
    }
}
