//! In-memory store backing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{broadcast, RwLock};

use sync_types::{
    ItemHash, ItemKind, Provenance, StorageRootId, SyncError, SyncableId, SyncableItemMetadata,
    SyncablePath,
};

use crate::backing::{BackingEvent, StoreBacking};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One node of the owned item tree. A node cannot contain itself by
/// construction.
#[derive(Debug, Clone)]
enum Node {
    File {
        metadata: SyncableItemMetadata,
        data: Vec<u8>,
    },
    FolderLike {
        kind: ItemKind,
        metadata: SyncableItemMetadata,
        children: BTreeMap<SyncableId, Node>,
    },
}

impl Node {
    fn metadata(&self) -> &SyncableItemMetadata {
        match self {
            Node::File { metadata, .. } => metadata,
            Node::FolderLike { metadata, .. } => metadata,
        }
    }

    fn children(&self, path: &SyncablePath) -> Result<&BTreeMap<SyncableId, Node>, SyncError> {
        match self {
            Node::FolderLike { children, .. } => Ok(children),
            Node::File { .. } => Err(wrong_type(path, "folder")),
        }
    }

    /// Recompute this node's hash, size and descendant count from its
    /// own content and (for folder-likes) its direct children.
    fn recompute(&mut self) {
        match self {
            Node::File { metadata, data } => {
                metadata.hash = ItemHash::of_content(data);
                metadata.size_bytes = data.len() as u64;
                metadata.num_descendants = 0;
            }
            Node::FolderLike {
                metadata, children, ..
            } => {
                let child_hashes: BTreeMap<SyncableId, ItemHash> = children
                    .iter()
                    .map(|(id, child)| (id.clone(), child.metadata().hash))
                    .collect();
                metadata.hash = ItemHash::of_children(own_content_hash(metadata), &child_hashes);
                metadata.num_descendants = children
                    .values()
                    .map(|c| 1 + c.metadata().num_descendants)
                    .sum();
            }
        }
    }
}

/// A folder-like item's own contribution to its hash: its opaque name
/// plus its provenance record.
fn own_content_hash(metadata: &SyncableItemMetadata) -> ItemHash {
    let mut bytes = Vec::with_capacity(metadata.name.len() + metadata.provenance.as_bytes().len());
    bytes.extend_from_slice(metadata.name.as_bytes());
    bytes.extend_from_slice(metadata.provenance.as_bytes());
    ItemHash::of_content(&bytes)
}

fn not_found(path: &SyncablePath) -> SyncError {
    SyncError::NotFound(path.to_string())
}

fn wrong_type(path: &SyncablePath, expected: &str) -> SyncError {
    SyncError::WrongType {
        path: path.to_string(),
        expected: expected.to_string(),
    }
}

/// An in-memory [`StoreBacking`] over an owned recursive node tree.
///
/// Every mutation re-hashes the full ancestor chain, so the
/// content-addressing invariant holds after each call, and emits a
/// [`BackingEvent`]. All state is owned by the instance; there are no
/// process-wide caches.
pub struct MemoryBacking {
    root_id: StorageRootId,
    tree: RwLock<Node>,
    events: broadcast::Sender<BackingEvent>,
}

impl MemoryBacking {
    /// Create an empty backing for the given storage root.
    pub fn new(root_id: StorageRootId) -> Self {
        let mut root = Node::FolderLike {
            kind: ItemKind::Folder,
            metadata: SyncableItemMetadata::new(
                root_id.as_str(),
                Provenance::default(),
                ItemHash::of_content(&[]),
                0,
            ),
            children: BTreeMap::new(),
        };
        root.recompute();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            root_id,
            tree: RwLock::new(root),
            events,
        }
    }

    fn check_root(&self, path: &SyncablePath) -> Result<(), SyncError> {
        if path.root != self.root_id {
            return Err(not_found(path));
        }
        Ok(())
    }

    fn node_at<'a>(&self, root: &'a Node, path: &SyncablePath) -> Result<&'a Node, SyncError> {
        let mut node = root;
        for id in &path.ids {
            node = node
                .children(path)?
                .get(id)
                .ok_or_else(|| not_found(path))?;
        }
        Ok(node)
    }

    /// Mutable resolution of the parent folder of `path`.
    fn parent_mut<'a>(
        &self,
        root: &'a mut Node,
        path: &SyncablePath,
    ) -> Result<(&'a mut BTreeMap<SyncableId, Node>, SyncableId), SyncError> {
        let Some(target) = path.last_id().cloned() else {
            return Err(wrong_type(path, "non-root item"));
        };
        let mut node = root;
        for id in &path.ids[..path.ids.len() - 1] {
            let children = match node {
                Node::FolderLike { children, .. } => children,
                Node::File { .. } => return Err(wrong_type(path, "folder")),
            };
            node = children.get_mut(id).ok_or_else(|| not_found(path))?;
        }
        match node {
            Node::FolderLike { children, .. } => Ok((children, target)),
            Node::File { .. } => Err(wrong_type(path, "folder")),
        }
    }

    /// Recompute hashes and descendant counts along `path`, leaf first.
    fn recompute_along(root: &mut Node, ids: &[SyncableId]) {
        if let Some((first, rest)) = ids.split_first() {
            if let Node::FolderLike { children, .. } = root {
                if let Some(child) = children.get_mut(first) {
                    Self::recompute_along(child, rest);
                }
            }
        }
        root.recompute();
    }

    fn emit(&self, event: BackingEvent) {
        // No receivers is fine; events are best-effort.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl StoreBacking for MemoryBacking {
    fn root(&self) -> SyncablePath {
        SyncablePath::root(self.root_id.clone())
    }

    async fn get_at_path(&self, path: &SyncablePath) -> Result<Vec<u8>, SyncError> {
        self.check_root(path)?;
        let tree = self.tree.read().await;
        match self.node_at(&tree, path)? {
            Node::File { data, .. } => Ok(data.clone()),
            Node::FolderLike { .. } => Err(wrong_type(path, "file")),
        }
    }

    async fn get_ids_in_path(&self, path: &SyncablePath) -> Result<Vec<SyncableId>, SyncError> {
        self.check_root(path)?;
        let tree = self.tree.read().await;
        let node = self.node_at(&tree, path)?;
        Ok(node.children(path)?.keys().cloned().collect())
    }

    async fn get_metadata_at_path(
        &self,
        path: &SyncablePath,
    ) -> Result<SyncableItemMetadata, SyncError> {
        self.check_root(path)?;
        let tree = self.tree.read().await;
        Ok(self.node_at(&tree, path)?.metadata().clone())
    }

    async fn get_metadata_by_id_in_path(
        &self,
        path: &SyncablePath,
        id: &SyncableId,
    ) -> Result<SyncableItemMetadata, SyncError> {
        self.check_root(path)?;
        let tree = self.tree.read().await;
        let node = self.node_at(&tree, path)?;
        let child = node
            .children(path)?
            .get(id)
            .ok_or_else(|| not_found(&path.child(id.clone())))?;
        Ok(child.metadata().clone())
    }

    async fn create_binary_file_with_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
        data: Vec<u8>,
    ) -> Result<(), SyncError> {
        self.check_root(path)?;
        {
            let mut tree = self.tree.write().await;
            let (children, id) = self.parent_mut(&mut tree, path)?;
            if id.kind != ItemKind::File {
                return Err(wrong_type(path, "file"));
            }
            if matches!(children.get(&id), Some(Node::FolderLike { .. })) {
                return Err(wrong_type(path, "file"));
            }
            let mut node = Node::File {
                metadata: SyncableItemMetadata::new(
                    id.name.clone(),
                    provenance,
                    ItemHash::of_content(&data),
                    data.len() as u64,
                ),
                data,
            };
            node.recompute();
            children.insert(id, node);
            Self::recompute_along(&mut tree, &path.ids);
        }
        self.emit(BackingEvent::ItemAdded(path.clone()));
        Ok(())
    }

    async fn create_folder_with_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
    ) -> Result<(), SyncError> {
        self.check_root(path)?;
        {
            let mut tree = self.tree.write().await;
            let (children, id) = self.parent_mut(&mut tree, path)?;
            if !id.kind.is_folder_like() {
                return Err(wrong_type(path, "folder"));
            }
            match children.get(&id) {
                Some(Node::File { .. }) => return Err(wrong_type(path, "folder")),
                // Re-creating an existing folder is an idempotent no-op;
                // re-sync after partial failure hits this constantly.
                Some(Node::FolderLike { .. }) => return Ok(()),
                None => {}
            }
            let mut node = Node::FolderLike {
                kind: id.kind,
                metadata: SyncableItemMetadata::new(
                    id.name.clone(),
                    provenance,
                    ItemHash::of_content(&[]),
                    0,
                ),
                children: BTreeMap::new(),
            };
            node.recompute();
            children.insert(id, node);
            Self::recompute_along(&mut tree, &path.ids);
        }
        self.emit(BackingEvent::FolderAdded(path.clone()));
        Ok(())
    }

    async fn delete_at_path(&self, path: &SyncablePath) -> Result<(), SyncError> {
        self.check_root(path)?;
        let was_folder;
        {
            let mut tree = self.tree.write().await;
            let (children, id) = self.parent_mut(&mut tree, path)?;
            let removed = children.remove(&id).ok_or_else(|| not_found(path))?;
            was_folder = matches!(removed, Node::FolderLike { .. });
            Self::recompute_along(&mut tree, &path.ids[..path.ids.len() - 1]);
        }
        if was_folder {
            self.emit(BackingEvent::FolderRemoved(path.clone()));
        }
        Ok(())
    }

    async fn update_local_metadata_at_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
    ) -> Result<(), SyncError> {
        self.check_root(path)?;
        let mut tree = self.tree.write().await;
        if path.is_root() {
            if let Node::FolderLike { metadata, .. } = &mut *tree {
                metadata.provenance = provenance;
            }
            Self::recompute_along(&mut tree, &[]);
            return Ok(());
        }
        {
            let (children, id) = self.parent_mut(&mut tree, path)?;
            let node = children.get_mut(&id).ok_or_else(|| not_found(path))?;
            match node {
                Node::File { metadata, .. } => metadata.provenance = provenance,
                Node::FolderLike { metadata, .. } => metadata.provenance = provenance,
            }
        }
        Self::recompute_along(&mut tree, &path.ids);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BackingEvent> {
        self.events.subscribe()
    }
}
