use crate::support::{demo_request, demo_source, importer, room};
use parking_lot::Mutex;
use std::sync::Arc;
use syncspace::document::RoomStorage;
use syncspace::error::{PublishStage, StoreError};
use syncspace::import::ImportState;
use syncspace::store::memory::StoreOp;
use syncspace::store::MemoryDocumentStore;
use syncspace::{CancelToken, ImportError, WorkspaceId};

/// Record every committed storage write of the store.
fn record_commits(store: &MemoryDocumentStore) -> Arc<Mutex<Vec<RoomStorage>>> {
    let commits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&commits);
    store.observe(Arc::new(move |_room: &WorkspaceId, storage: &RoomStorage| {
        sink.lock().push(storage.clone());
    }));
    commits
}

fn fail_content_pushes(store: &MemoryDocumentStore) {
    for _ in 0..3 {
        store.fail_next(
            StoreOp::SendUpdate,
            StoreError::Unavailable("sync service down".to_string()),
        );
    }
}

#[tokio::test]
async fn every_committed_snapshot_is_complete() {
    let store = Arc::new(MemoryDocumentStore::new());
    let commits = record_commits(&store);
    let importer = importer(demo_source(), store.clone());

    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();
    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    let commits = commits.lock();
    assert_eq!(commits.len(), 2);
    for storage in commits.iter() {
        let tree = storage.file_tree.as_ref().expect("snapshot written whole");
        assert!(tree.is_initialized);
        tree.validate().unwrap();
        assert_eq!(tree.files.len(), 5);
    }
}

#[tokio::test]
async fn content_failure_on_first_import_leaves_room_uninitialized() {
    let store = Arc::new(MemoryDocumentStore::new());
    fail_content_pushes(&store);
    let importer = importer(demo_source(), store.clone());

    let err = importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ImportError::PublishFailure {
            stage: PublishStage::Content,
            snapshot_committed: true,
            ..
        }
    ));
    let storage = store.storage(&room());
    assert!(!storage.is_initialized());
    assert!(storage.file_tree.is_none());
    assert_eq!(store.update_count(&room()), 0);
    assert_eq!(importer.status(&room()), ImportState::Failed);

    // The whole import is safe to retry
    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();
    assert!(store.storage(&room()).is_initialized());
    assert_eq!(importer.status(&room()), ImportState::Done);
}

#[tokio::test]
async fn content_failure_on_reimport_keeps_previous_snapshot() {
    let source = demo_source();
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = importer(source.clone(), store.clone());

    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();
    let before = store.storage(&room());
    let commits = record_commits(&store);

    source.add_file("CHANGELOG.md", "v2");
    fail_content_pushes(&store);
    let err = importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::PublishFailure { .. }));

    assert_eq!(store.storage(&room()), before);
    for storage in commits.lock().iter() {
        assert!(
            storage.is_initialized(),
            "isInitialized must never be observed false after a successful import"
        );
    }
}

#[tokio::test]
async fn snapshot_failure_publishes_nothing() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.fail_next(
        StoreOp::Mutate,
        StoreError::Unauthorized("bad secret".to_string()),
    );

    let err = importer(demo_source(), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ImportError::PublishFailure {
            stage: PublishStage::Snapshot,
            snapshot_committed: false,
            ..
        }
    ));
    assert_eq!(store.operations(), vec![StoreOp::GetDocument, StoreOp::Mutate]);
    assert_eq!(store.update_count(&room()), 0);
}
