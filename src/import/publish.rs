//! Publication of a built document to the Shared Document Store
//!
//! The room is read once first: its storage is what a rollback restores and
//! its CRDT state is what the content update is encoded against. Then two
//! ordered steps: the structural snapshot goes out as one atomic storage
//! mutation, then the CRDT content as one binary update. If the second step
//! fails the snapshot write is compensated, so `isInitialized` is never left
//! pointing at content that was not delivered.

use crate::config::ImportConfig;
use crate::document::{BuiltDocument, RepoMeta, RoomStorage};
use crate::error::{ImportError, PublishStage, StoreError};
use crate::store::{DocumentStore, RoomDocument};
use crate::types::WorkspaceId;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Publisher {
    store: Arc<dyn DocumentStore>,
    config: ImportConfig,
}

impl Publisher {
    pub fn new(store: Arc<dyn DocumentStore>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    pub async fn publish(
        &self,
        room: &WorkspaceId,
        built: &BuiltDocument,
        repo_meta: &RepoMeta,
    ) -> Result<(), ImportError> {
        let baseline = self.read_baseline(room).await?;
        let update = built.encode_update(&baseline.updates)?;

        let mut snapshot = built.snapshot.clone();
        snapshot.active_file_id = String::new();
        snapshot.is_initialized = true;
        let meta = repo_meta.clone();
        let write_snapshot = move |storage: &mut RoomStorage| {
            storage.file_tree = Some(snapshot.clone());
            storage.repo_meta = Some(meta.clone());
        };

        // Rollback restores the baseline: after a lost response, a retried
        // write reports this import's own snapshot as the previous storage.
        self.with_retry(room, PublishStage::Snapshot, || {
            self.store.mutate(room, &write_snapshot)
        })
        .await
        .map_err(|source| ImportError::PublishFailure {
            stage: PublishStage::Snapshot,
            source,
            snapshot_committed: false,
        })?;
        info!(room = %room, nodes = built.snapshot.files.len(), "Published structural snapshot");

        let pushed = self
            .with_retry(room, PublishStage::Content, || {
                self.store.send_binary_update(room, &update)
            })
            .await;
        if let Err(source) = pushed {
            self.roll_back(room, baseline.storage).await;
            return Err(ImportError::PublishFailure {
                stage: PublishStage::Content,
                source,
                snapshot_committed: true,
            });
        }
        info!(room = %room, bytes = update.len(), "Published document content");
        Ok(())
    }

    /// Storage and CRDT state of the room before this import; empty for a new room.
    async fn read_baseline(&self, room: &WorkspaceId) -> Result<RoomDocument, ImportError> {
        let read = self
            .with_retry(room, PublishStage::Baseline, || async {
                match self.store.get_document(room).await {
                    Err(StoreError::NotFound(_)) => Ok(RoomDocument::default()),
                    other => other,
                }
            })
            .await
            .map_err(|source| ImportError::PublishFailure {
                stage: PublishStage::Baseline,
                source,
                snapshot_committed: false,
            })?;
        debug!(room = %room, updates = read.updates.len(), "Read room baseline");
        Ok(read)
    }

    /// Put back the storage fields the snapshot write replaced.
    async fn roll_back(&self, room: &WorkspaceId, previous: RoomStorage) {
        let restore = move |storage: &mut RoomStorage| {
            storage.file_tree = previous.file_tree.clone();
            storage.repo_meta = previous.repo_meta.clone();
        };
        match self
            .with_retry(room, PublishStage::Snapshot, || self.store.mutate(room, &restore))
            .await
        {
            Ok(_) => warn!(room = %room, "Rolled back structural snapshot"),
            Err(e) => error!(room = %room, error = %e, "Failed to roll back structural snapshot"),
        }
    }

    async fn with_retry<T, F, Fut>(
        &self,
        room: &WorkspaceId,
        stage: PublishStage,
        mut op: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.config.publish_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        room = %room,
                        stage = %stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
