//! The durable item-store interface.

use async_trait::async_trait;
use tokio::sync::broadcast;

use sync_types::{
    Provenance, SyncError, SyncableId, SyncableItemMetadata, SyncablePath,
};

/// A local mutation observed on a backing.
///
/// The sync service reacts to these: new folders start being watched and
/// pulled, new items get pushed out, removed folders stop being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackingEvent {
    /// A folder or bundle appeared.
    FolderAdded(SyncablePath),
    /// A folder or bundle was deleted.
    FolderRemoved(SyncablePath),
    /// A file appeared or changed.
    ItemAdded(SyncablePath),
}

impl BackingEvent {
    /// The path the event concerns.
    pub fn path(&self) -> &SyncablePath {
        match self {
            BackingEvent::FolderAdded(path)
            | BackingEvent::FolderRemoved(path)
            | BackingEvent::ItemAdded(path) => path,
        }
    }
}

/// Durable storage of syncable items, consumed by the reconciliation
/// engine.
///
/// Every method may fail with [`SyncError::NotFound`] (the addressed item
/// is absent) or [`SyncError::WrongType`] (the path addressed the wrong
/// item kind). Implementations maintain the content-addressing invariant
/// themselves: any mutation recomputes the hashes of every ancestor up to
/// the root.
#[async_trait]
pub trait StoreBacking: Send + Sync {
    /// The path of this backing's storage root.
    fn root(&self) -> SyncablePath;

    /// Read a file's content bytes.
    async fn get_at_path(&self, path: &SyncablePath) -> Result<Vec<u8>, SyncError>;

    /// List the direct children of a folder-like item.
    async fn get_ids_in_path(&self, path: &SyncablePath) -> Result<Vec<SyncableId>, SyncError>;

    /// Read the metadata of the item at `path`.
    async fn get_metadata_at_path(
        &self,
        path: &SyncablePath,
    ) -> Result<SyncableItemMetadata, SyncError>;

    /// Read the metadata of a direct child of the folder-like at `path`.
    async fn get_metadata_by_id_in_path(
        &self,
        path: &SyncablePath,
        id: &SyncableId,
    ) -> Result<SyncableItemMetadata, SyncError>;

    /// Create or replace a file at `path` with the given provenance and
    /// content. The parent must already exist.
    async fn create_binary_file_with_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
        data: Vec<u8>,
    ) -> Result<(), SyncError>;

    /// Create a folder or bundle at `path` (kind taken from the last id).
    async fn create_folder_with_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
    ) -> Result<(), SyncError>;

    /// Delete the item at `path`, recursively for folder-likes.
    async fn delete_at_path(&self, path: &SyncablePath) -> Result<(), SyncError>;

    /// Replace the locally stored metadata (name, provenance) of the item
    /// at `path`. Hashes are recomputed by the backing, not taken from
    /// the caller.
    async fn update_local_metadata_at_path(
        &self,
        path: &SyncablePath,
        provenance: Provenance,
    ) -> Result<(), SyncError>;

    /// Subscribe to local mutation events.
    fn subscribe(&self) -> broadcast::Receiver<BackingEvent>;
}
