//! In-memory Shared Document Store
//!
//! Rooms live behind one mutex. A mutation runs against a clone of the room's
//! storage and the clone replaces the original in a single step, so readers
//! only ever see committed states. Tests can inject failures and observe every
//! committed storage write.

use super::{DocumentStore, Mutation, RoomDocument};
use crate::document::RoomStorage;
use crate::error::StoreError;
use crate::types::WorkspaceId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Mutate,
    SendUpdate,
    GetDocument,
}

/// Called with the room and the storage after every committed mutation.
pub type StorageObserver = Arc<dyn Fn(&WorkspaceId, &RoomStorage) + Send + Sync>;

#[derive(Default)]
struct Room {
    storage: RoomStorage,
    updates: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    rooms: Mutex<HashMap<WorkspaceId, Room>>,
    failures: Mutex<VecDeque<(StoreOp, StoreError)>>,
    observers: Mutex<Vec<StorageObserver>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a room's storage without going through `mutate`.
    pub fn seed(&self, room: &WorkspaceId, storage: RoomStorage) {
        self.rooms.lock().entry(room.clone()).or_default().storage = storage;
    }

    /// Make the next call of `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.failures.lock().push_back((op, error));
    }

    pub fn observe(&self, observer: StorageObserver) {
        self.observers.lock().push(observer);
    }

    /// Operations attempted so far, including failed ones.
    pub fn operations(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }

    pub fn storage(&self, room: &WorkspaceId) -> RoomStorage {
        self.rooms
            .lock()
            .get(room)
            .map(|r| r.storage.clone())
            .unwrap_or_default()
    }

    pub fn update_count(&self, room: &WorkspaceId) -> usize {
        self.rooms.lock().get(room).map(|r| r.updates.len()).unwrap_or(0)
    }

    fn begin(&self, op: StoreOp) -> Result<(), StoreError> {
        self.ops.lock().push(op);
        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, error)) = failures.remove(pos) {
                return Err(error);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn mutate(
        &self,
        room: &WorkspaceId,
        mutation: Mutation<'_>,
    ) -> Result<RoomStorage, StoreError> {
        self.begin(StoreOp::Mutate)?;
        let (previous, committed) = {
            let mut rooms = self.rooms.lock();
            let entry = rooms.entry(room.clone()).or_default();
            let previous = entry.storage.clone();
            let mut next = previous.clone();
            mutation(&mut next);
            entry.storage = next.clone();
            (previous, next)
        };
        let observers = self.observers.lock().clone();
        for observer in observers {
            (*observer)(room, &committed);
        }
        Ok(previous)
    }

    async fn send_binary_update(&self, room: &WorkspaceId, update: &[u8]) -> Result<(), StoreError> {
        self.begin(StoreOp::SendUpdate)?;
        self.rooms
            .lock()
            .entry(room.clone())
            .or_default()
            .updates
            .push(update.to_vec());
        Ok(())
    }

    async fn get_document(&self, room: &WorkspaceId) -> Result<RoomDocument, StoreError> {
        self.begin(StoreOp::GetDocument)?;
        let rooms = self.rooms.lock();
        let room = rooms
            .get(room)
            .ok_or_else(|| StoreError::NotFound(room.to_string()))?;
        Ok(RoomDocument {
            storage: room.storage.clone(),
            updates: room.updates.clone(),
        })
    }
}
