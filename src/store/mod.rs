//! Shared Document Store
//!
//! Client side of the real-time sync service. A room holds structured storage
//! (the file-tree snapshot and repository metadata) and a CRDT document built
//! from binary updates. Storage mutations are applied atomically by the store.

pub mod http;
pub mod memory;

pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::document::{DocumentReader, RoomStorage};
use crate::error::{DocumentError, StoreError};
use crate::tree::identity::NodeId;
use crate::types::WorkspaceId;
use async_trait::async_trait;
use tracing::debug;

/// A storage mutation. Stores may run it more than once when a concurrent
/// write forces a retry, so it must only depend on its argument.
pub type Mutation<'a> = &'a (dyn Fn(&mut RoomStorage) + Send + Sync);

/// Everything a room currently holds.
#[derive(Debug, Clone, Default)]
pub struct RoomDocument {
    pub storage: RoomStorage,
    /// Binary CRDT updates in the order the store applied them
    pub updates: Vec<Vec<u8>>,
}

impl RoomDocument {
    /// Rebuild the CRDT document from the room's updates.
    pub fn reader(&self) -> Result<DocumentReader, DocumentError> {
        DocumentReader::from_updates(&self.updates)
    }
}

/// Shared Document Store interface
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Apply `mutation` to the room's storage as one atomic write.
    ///
    /// Returns the storage as it was immediately before the committed write.
    async fn mutate(&self, room: &WorkspaceId, mutation: Mutation<'_>)
        -> Result<RoomStorage, StoreError>;

    /// Push an encoded CRDT update to the room's document.
    async fn send_binary_update(&self, room: &WorkspaceId, update: &[u8]) -> Result<(), StoreError>;

    /// Read the room's storage and document state.
    async fn get_document(&self, room: &WorkspaceId) -> Result<RoomDocument, StoreError>;
}

/// Mark `id` as the room's active file.
///
/// Returns false, leaving storage unchanged, when the room has no snapshot or
/// the snapshot has no such node.
pub async fn set_active_file(
    store: &dyn DocumentStore,
    room: &WorkspaceId,
    id: &NodeId,
) -> Result<bool, StoreError> {
    let target = id.clone();
    let previous = store
        .mutate(room, &move |storage: &mut RoomStorage| {
            if let Some(tree) = storage.file_tree.as_mut() {
                if tree.files.contains_key(&target) {
                    tree.active_file_id = target.to_string();
                }
            }
        })
        .await?;
    let applied = previous
        .file_tree
        .map(|tree| tree.files.contains_key(id))
        .unwrap_or(false);
    debug!(room = %room, id = %id, applied, "Set active file");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FileTreeSnapshot, NodeMetadata};
    use crate::tree::identity::RepoPath;
    use crate::types::NodeKind;
    use std::collections::BTreeMap;

    fn storage_with_root() -> RoomStorage {
        let root = NodeMetadata {
            id: NodeId::root(),
            name: "/".to_string(),
            path: RepoPath::root(),
            kind: NodeKind::Directory,
            children: Some(vec![]),
            language: None,
            sha: None,
            last_modified: None,
        };
        RoomStorage {
            file_tree: Some(FileTreeSnapshot {
                files: BTreeMap::from([(NodeId::root(), root)]),
                active_file_id: String::new(),
                root_dir_id: NodeId::root(),
                is_initialized: true,
            }),
            repo_meta: None,
        }
    }

    #[tokio::test]
    async fn test_set_active_file_requires_known_id() {
        let store = MemoryDocumentStore::new();
        let room = WorkspaceId::from("ws");
        store.seed(&room, storage_with_root());

        assert!(set_active_file(&store, &room, &NodeId::root()).await.unwrap());
        let doc = store.get_document(&room).await.unwrap();
        assert_eq!(doc.storage.file_tree.unwrap().active_file_id, "root");

        let unknown = crate::tree::identity::encode(&RepoPath::parse("nope.txt").unwrap());
        assert!(!set_active_file(&store, &room, &unknown).await.unwrap());
    }
}
